use actix_web::middleware::Next;
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_LENGTH,
    Error,
};
use std::time::Instant;

/// Logs one line per request and one per response.
///
/// Bodies are never logged: JSON-RPC params carry encrypted keys.
pub async fn request_logger(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.path().to_string();
    let peer = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string)
        .unwrap_or_else(|| "-".to_string());
    let body_len = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("0")
        .to_string();

    tracing::info!("--> {} {} ({} bytes from {})", method, path, body_len, peer);

    let res = next.call(req).await?;

    let elapsed = start.elapsed().as_millis();
    let status = res.status();

    if status.is_client_error() || status.is_server_error() {
        tracing::warn!("<-- {} {} {} ({}ms)", method, path, status.as_u16(), elapsed);
    } else {
        tracing::info!("<-- {} {} {} ({}ms)", method, path, status.as_u16(), elapsed);
    }

    Ok(res)
}
