//! Error types for repack-scan
//!
//! `RepackError` is the orchestrator's taxonomy; `ApiError` maps it (and
//! everything else a handler can hit) onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Orchestrator error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepackError {
    /// Operation not valid in the current session or item state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation on a path that has no result entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Scan or conversion engine reported an error
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// The service task is gone (shutdown or panic)
    #[error("Repack service stopped")]
    ServiceStopped,
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., scan already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Engine failure (502)
    #[error("Engine failure: {0}")]
    BadGateway(String),

    /// Service unavailable (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// repack-common error
    #[error("Common error: {0}")]
    Common(#[from] repack_common::Error),
}

impl From<RepackError> for ApiError {
    fn from(err: RepackError) -> Self {
        match err {
            RepackError::InvalidState(msg) => ApiError::Conflict(msg),
            RepackError::NotFound(msg) => ApiError::NotFound(msg),
            RepackError::EngineFailure(msg) => ApiError::BadGateway(msg),
            RepackError::ServiceStopped => {
                ApiError::Unavailable("Repack service stopped".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "ENGINE_FAILURE", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_STOPPED", msg)
            }
            ApiError::Common(ref err) => match err {
                repack_common::Error::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                repack_common::Error::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    err.to_string(),
                ),
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
