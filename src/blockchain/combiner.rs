use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::blockchain::traits::SignatureCombiner;
use crate::config::CombinerConfig;
use crate::error::{AppError, AppResult};

const COMBINE_METHOD: &str = "combinerawtransaction";

/// Signature combiner backed by a node's `combinerawtransaction` RPC
pub struct RpcSignatureCombiner {
    client: reqwest::Client,
    rpc_url: String,
    rpc_user: Option<String>,
    rpc_password: Option<String>,
}

// JSON-RPC request/response types
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl RpcSignatureCombiner {
    pub fn new(config: &CombinerConfig) -> AppResult<Self> {
        tracing::info!("Initializing signature combiner with RPC: {}", config.rpc_url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            rpc_user: config.rpc_user.clone(),
            rpc_password: config.rpc_password.clone(),
        })
    }

    async fn rpc_call<T: serde::de::DeserializeOwned, P: Serialize>(
        &self,
        method: &'static str,
        params: P,
    ) -> AppResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            id: 1,
            method,
            params,
        };

        let mut request_builder = self.client.post(&self.rpc_url);

        // Add basic auth if configured
        if let Some(user) = &self.rpc_user {
            request_builder = request_builder.basic_auth(user, self.rpc_password.as_ref());
        }

        // Nodes report RPC errors with a non-2xx status and a JSON body, so the
        // body is parsed regardless of status
        let response = request_builder
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceFailure(format!("RPC request failed: {}", e)))?;

        let status = response.status();
        let rpc_response: JsonRpcResponse<T> = response.json().await.map_err(|e| {
            AppError::ExternalServiceFailure(format!(
                "Failed to parse RPC response (HTTP {}): {}",
                status, e
            ))
        })?;

        if let Some(error) = rpc_response.error {
            return Err(AppError::ExternalServiceFailure(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| AppError::ExternalServiceFailure("Empty RPC response".to_string()))
    }
}

#[async_trait]
impl SignatureCombiner for RpcSignatureCombiner {
    async fn combine(&self, partials: &[String]) -> AppResult<String> {
        if partials.is_empty() {
            return Err(AppError::ValidationError(
                "No partial transactions to combine".to_string(),
            ));
        }

        tracing::info!(
            "Combining {} partial transactions via {}",
            partials.len(),
            self.rpc_url
        );

        let combined: String = self.rpc_call(COMBINE_METHOD, (partials,)).await?;

        if combined.is_empty() || hex::decode(&combined).is_err() {
            return Err(AppError::ExternalServiceFailure(
                "Combiner returned a non-hex transaction".to_string(),
            ));
        }

        tracing::debug!("Combined raw transaction: {}", combined);
        Ok(combined)
    }
}
