//! Error types for praise-api
//!
//! Maps service errors onto HTTP status codes with a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller identity missing or unknown (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request body or path (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// praise-common error, mapped by variant
    #[error(transparent)]
    Common(#[from] praise_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(praise_common::Error::Database(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use praise_common::Error as E;

        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Common(err) => match err {
                E::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                E::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg),
                E::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
                E::StateConflict(msg) => (StatusCode::CONFLICT, "STATE_CONFLICT", msg),
                // Details stay in the log; clients get a fixed message
                other => {
                    error!("Request failed: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "Internal server error".to_string(),
                    )
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
