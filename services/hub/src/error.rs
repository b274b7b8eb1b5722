//! Custom error types for the hub service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the hub service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed input the caller can correct
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing, invalid or expired credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// The entity already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A transient condition such as lock contention; safe to retry
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error
    #[error("Internal server error")]
    Internal,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ApiError {
    /// Log an unexpected failure and hide its details from the caller
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, err);
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::Database(err) if err.is_retryable() => {
                error!("Transient database error: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage temporarily unavailable, please retry".to_string(),
                )
            }
            ApiError::Database(err) => {
                error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
