pub mod models;
pub mod repositories;

use crate::config::DatabaseConfig;
use crate::error::AppResult;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<MySqlPool> {
    use std::time::Duration;

    let url = config.url();
    tracing::info!("Connecting to database at {}:{}/{}", config.host, config.port, config.name);

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&url)
        .await
        .map_err(|e| crate::error::AppError::DatabaseError(format!("Failed to connect to database: {}", e)))?;

    tracing::info!("Database connection pool created successfully (max: {})", config.max_connections);
    Ok(pool)
}

pub async fn run_migrations(pool: &MySqlPool) -> AppResult<()> {
    // Addresses handed out or imported; the indexer watches these
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS address (
            id INT PRIMARY KEY AUTO_INCREMENT,
            address VARCHAR(128) NOT NULL,
            extra INT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NULL,
            UNIQUE KEY unique_address (address)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Populated by the external indexer; this service only reads rows and flips `pending`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS utxo (
            id INT PRIMARY KEY AUTO_INCREMENT,
            txid VARCHAR(128) NOT NULL,
            vout INT NOT NULL,
            amount VARCHAR(128) NOT NULL,
            used INT NOT NULL DEFAULT 0,
            address VARCHAR(128) NOT NULL,
            scriptpubkey VARCHAR(128) NOT NULL,
            coin_symbol VARCHAR(128) NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NULL,
            pending INT NOT NULL DEFAULT 0,
            UNIQUE KEY unique_outpoint (txid, vout),
            INDEX idx_address_spendable (address, used, pending)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
