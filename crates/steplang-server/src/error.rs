//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It
//! implements `axum::response::IntoResponse` to produce structured JSON
//! error responses with appropriate HTTP status codes.
//!
//! Run failures (syntax or runtime) are not `ApiError`s: they are part of
//! the run response body, mirroring how the viewer presents them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let detail = ApiErrorDetail {
            code: code.to_string(),
            message: self.to_string(),
        };
        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<steplang_storage::StorageError> for ApiError {
    fn from(err: steplang_storage::StorageError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<steplang_harness::HarnessError> for ApiError {
    fn from(err: steplang_harness::HarnessError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
