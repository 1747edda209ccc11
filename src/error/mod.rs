use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::blockchain::bitcoin::SigningError;

#[derive(Debug)]
pub enum AppError {
    // Resource errors
    NotFound(String),

    // Validation errors
    ValidationError(String),

    // Signing engine errors
    SigningError(SigningError),

    // Signature combiner errors
    ExternalServiceFailure(String),

    // Encryption errors
    EncryptionError(String),

    // Database errors
    DatabaseError(String),

    // Configuration errors
    ConfigError(String),

    // Internal errors
    InternalError(String),
}

impl AppError {
    /// True when the caller sent something the service cannot act on
    pub fn is_client_error(&self) -> bool {
        match self {
            AppError::NotFound(_) | AppError::ValidationError(_) => true,
            AppError::SigningError(err) => {
                err.is_input_validation()
                    || matches!(
                        err,
                        SigningError::MalformedTransaction(_) | SigningError::MalformedSignature(_)
                    )
            }
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::SigningError(err) => write!(f, "Signing error: {}", err),
            AppError::ExternalServiceFailure(msg) => write!(f, "External service failure: {}", msg),
            AppError::EncryptionError(msg) => write!(f, "Encryption error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::SigningError(err) => Some(err),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_message = serde_json::json!({
            "error": self.to_string()
        });

        match self {
            AppError::NotFound(_) => HttpResponse::NotFound().json(error_message),
            AppError::ExternalServiceFailure(_) => HttpResponse::BadGateway().json(error_message),
            _ if self.is_client_error() => HttpResponse::BadRequest().json(error_message),
            _ => HttpResponse::InternalServerError().json(error_message),
        }
    }
}

impl From<SigningError> for AppError {
    fn from(err: SigningError) -> Self {
        AppError::SigningError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Combiner transport error: {:?}", err);
        AppError::ExternalServiceFailure(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
