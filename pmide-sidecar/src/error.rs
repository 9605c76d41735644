//! Error types for pmide-sidecar

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::providers::ProviderError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// LLM provider or fetched site failed (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// pmide-common error
    #[error(transparent)]
    Common(#[from] pmide_common::Error),
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use pmide_common::Error as CommonError;

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                CommonError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                CommonError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
                CommonError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
                CommonError::Json(e) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string()),
                other => {
                    tracing::error!("Request failed: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", other.to_string())
                }
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
