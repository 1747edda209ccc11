use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use btc_signing_service::api;
use btc_signing_service::blockchain::bitcoin::SigningEngine;
use btc_signing_service::blockchain::{RpcSignatureCombiner, SignatureCombiner};
use btc_signing_service::config::{AppConfig, LoggingConfig};
use btc_signing_service::crypto::KeyCipher;
use btc_signing_service::db::{self, repositories::{AddressRepository, UtxoRepository}};
use btc_signing_service::services::{SigningService, WalletService};

/// Console plus size-rotated file output. The returned guard flushes the file writer on drop.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("Failed to create log directory {}", config.dir))?;

    let log_path = std::path::Path::new(&config.dir).join(&config.file_name);
    let file_appender = rolling_file::RollingFileAppender::new(
        log_path,
        rolling_file::RollingConditionBasic::new().max_size(config.max_file_size_mb * 1024 * 1024),
        config.max_files,
    )
    .context("Failed to create log file appender")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.filter.clone()),
    );

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    Ok(guard)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Logging settings live in the config, so it is loaded first
    let config = AppConfig::load().context("Failed to load configuration")?;
    let _log_guard = init_logging(&config.logging)?;

    tracing::info!("Starting BTC signing service");
    tracing::info!(
        "Database: {}:{}/{}",
        config.database.host,
        config.database.port,
        config.database.name
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    // Argon2 runs once here, not per request
    let cipher = Arc::new(KeyCipher::new(
        &config.security.passphrase,
        &config.security.kdf_salt,
    )?);
    let combiner: Arc<dyn SignatureCombiner> = Arc::new(RpcSignatureCombiner::new(&config.combiner)?);

    let wallet_service = Arc::new(WalletService::new(
        AddressRepository::new(pool.clone()),
        UtxoRepository::new(pool.clone()),
        cipher.clone(),
        config.limits.max_generate_count,
    ));
    let signing_service = Arc::new(SigningService::new(
        Arc::new(SigningEngine::new()),
        cipher,
        combiner,
        UtxoRepository::new(pool),
    ));

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    tracing::info!("Starting HTTP server at {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::from_fn(api::middleware::request_logger))
            .app_data(web::Data::new(wallet_service.clone()))
            .app_data(web::Data::new(signing_service.clone()))
            .configure(api::configure_routes)
    })
    .bind((server_host, server_port))
    .context("Failed to bind HTTP server")?
    .run()
    .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
