//! Crate-wide API error type and the teacher's JSON error envelope.
//!
//! Handlers return `Result<T, ApiError>`; `ApiError` implements
//! `IntoResponse` so the router renders a consistent error body. Status
//! codes follow the spec: Validation (400), Authorization (403, distinct
//! from NotFound 404), Unauthorized (401), Conflict (409), and
//! Database/Internal (500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Crate-wide error surfaced from HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        ApiError::Internal(format!("connection pool error: {e}"))
    }
}

impl ApiError {
    /// 400 Bad Request — request failed validation.
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// 403 Forbidden — the caller is authenticated but not authorized.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Authorization(msg.into())
    }

    /// 404 Not Found — the target resource does not exist.
    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    /// 401 Unauthorized — authentication failed or is missing.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    /// HTTP status code for this error kind.
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable code for the error envelope.
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Authorization(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) | ApiError::Database(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();
        let body = Json(serde_json::json!({
            "error": code.to_ascii_lowercase(),
            "message": message,
            "code": code,
        }));
        (status, body).into_response()
    }
}
