//! Error types for the escrow workflow
//!
//! `EscrowError` is what the services return. `ApiError` is what handlers
//! return; it maps domain errors to HTTP status codes and hides
//! infrastructure details from clients.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use tracing::error;

/// Errors raised by the escrow lifecycle, roster, split and account services
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Caller lacks the capability or relationship required for the operation
    #[error("{0}")]
    Authorization(String),

    /// Payload fails a structural or business rule
    #[error("{0}")]
    Validation(String),

    /// Referenced transaction, participant or user does not exist
    #[error("{0}")]
    NotFound(String),

    /// Unique resource already exists (e.g. duplicate user email)
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// Unexpected state, e.g. an unknown enum value read back from storage
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EscrowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EscrowError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EscrowError::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        EscrowError::Authorization(msg.into())
    }
}

impl From<validator::ValidationErrors> for EscrowError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| {
                        errs.first()
                            .map(|e| e.code.to_string())
                            .unwrap_or_else(|| "invalid".to_string())
                    });
                format!("{}: {}", field, detail)
            })
            .collect();
        fields.sort();
        EscrowError::Validation(fields.join("; "))
    }
}

/// Result type for escrow service operations
pub type EscrowResult<T> = Result<T, EscrowError>;

/// HTTP-facing error
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

impl From<EscrowError> for ApiError {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::Authorization(msg) => ApiError::Forbidden(msg),
            EscrowError::Validation(msg) => ApiError::BadRequest(msg),
            EscrowError::NotFound(msg) => ApiError::NotFound(msg),
            EscrowError::Conflict(msg) => ApiError::Conflict(msg),
            other => {
                error!(error = %other, "Escrow operation failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        error!(error = %err, "Blocking database task failed");
        ApiError::Internal("Internal server error".to_string())
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ApiError::from(EscrowError::Pool(err))
    }
}
