use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    /// Passphrase the private-key encryption key is derived from
    pub passphrase: String,
    /// Argon2 salt for the key derivation, at least 8 bytes
    pub kdf_salt: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("passphrase", &"<redacted>")
            .field("kdf_salt", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CombinerConfig {
    /// JSON-RPC endpoint of the node that merges partial multisig signatures
    pub rpc_url: String,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub dir: String,
    pub file_name: String,
    pub max_file_size_mb: u64,
    pub max_files: usize,
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Upper bound on addresses created by a single generate_address call
    pub max_generate_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub combiner: CombinerConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 15060)?
            // Database defaults
            .set_default("database.host", "localhost")?
            .set_default("database.port", 3306)?
            .set_default("database.user", "root")?
            .set_default("database.password", "")?
            .set_default("database.name", "btc_wallet")?
            .set_default("database.max_connections", 10)?
            // Security has no usable defaults; both values must be supplied
            .set_default("security.passphrase", "")?
            .set_default("security.kdf_salt", "")?
            // Combiner defaults
            .set_default("combiner.rpc_url", "http://127.0.0.1:8332")?
            .set_default("combiner.rpc_user", Option::<String>::None)?
            .set_default("combiner.rpc_password", Option::<String>::None)?
            .set_default("combiner.timeout_secs", 30)?
            // Logging defaults
            .set_default("logging.dir", "logs")?
            .set_default("logging.file_name", "btc-signing.log")?
            .set_default("logging.max_file_size_mb", 100)?
            .set_default("logging.max_files", 10)?
            .set_default("logging.filter", "info,sqlx=warn")?
            // Limits
            .set_default("limits.max_generate_count", 1000)?
            // Load from config.toml if exists
            .add_source(File::with_name("config").required(false))
            // Override with environment variables (prefix: BTCSIGN_)
            // Use __ as separator so BTCSIGN_SECURITY__PASSPHRASE -> security.passphrase
            .add_source(
                Environment::with_prefix("BTCSIGN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.security.passphrase.is_empty() {
            return Err(AppError::ConfigError(
                "Security passphrase cannot be empty".to_string(),
            ));
        }

        if self.security.kdf_salt.len() < 8 {
            return Err(AppError::ConfigError(
                "KDF salt must be at least 8 bytes".to_string(),
            ));
        }

        url::Url::parse(&self.combiner.rpc_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid combiner RPC URL: {}", e))
        })?;

        if self.database.host.is_empty() {
            return Err(AppError::ConfigError(
                "Database host cannot be empty".to_string(),
            ));
        }
        if self.database.name.is_empty() {
            return Err(AppError::ConfigError(
                "Database name cannot be empty".to_string(),
            ));
        }

        if self.limits.max_generate_count == 0 {
            return Err(AppError::ConfigError(
                "limits.max_generate_count must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 15060,
            },
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: String::new(),
                name: "btc_wallet".to_string(),
                max_connections: 10,
            },
            security: SecurityConfig {
                passphrase: String::new(),
                kdf_salt: String::new(),
            },
            combiner: CombinerConfig {
                rpc_url: "http://127.0.0.1:8332".to_string(),
                rpc_user: None,
                rpc_password: None,
                timeout_secs: 30,
            },
            logging: LoggingConfig {
                dir: "logs".to_string(),
                file_name: "btc-signing.log".to_string(),
                max_file_size_mb: 100,
                max_files: 10,
                filter: "info,sqlx=warn".to_string(),
            },
            limits: LimitsConfig {
                max_generate_count: 1000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.security.passphrase = "correct horse battery staple".to_string();
        config.security.kdf_salt = "btc-sign-salt".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_requires_secrets() {
        assert!(matches!(
            AppConfig::default().validate(),
            Err(AppError::ConfigError(ref msg)) if msg.contains("passphrase")
        ));
    }

    #[test]
    fn test_source_errors_become_config_errors() {
        // No sources at all: every section is missing
        let load_empty = || -> AppResult<AppConfig> {
            Ok(Config::builder().build()?.try_deserialize()?)
        };
        assert!(matches!(load_empty(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_short_salt_rejected() {
        let mut config = valid_config();
        config.security.kdf_salt = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_combiner_url_rejected() {
        let mut config = valid_config();
        config.combiner.rpc_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_database_url() {
        let config = valid_config();
        assert_eq!(
            config.database.url(),
            "mysql://root:@localhost:3306/btc_wallet"
        );
    }

    #[test]
    fn test_security_debug_redacts() {
        let config = valid_config();
        let debug = format!("{:?}", config.security);
        assert!(!debug.contains("correct horse"));
    }
}
