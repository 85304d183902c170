//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coursesync_sync::SyncError;
use coursesync_sync::protocol::ErrorBody;
use tracing::error;

/// An error returned by a handler as `{code, message}` JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn missing_key() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing_key", "API key is required.")
    }

    pub fn invalid_key() -> Self {
        Self::new(StatusCode::FORBIDDEN, "invalid_key", "Invalid API key.")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_exceeded",
            "Too many requests. Please try again later.",
        )
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match &err {
            SyncError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string()),
            SyncError::ContentTypeMismatch { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_type", err.to_string())
            }
            SyncError::Validation(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_item", err.to_string())
            }
            SyncError::Authentication(_) => Self::invalid_key(),
            _ => {
                error!(error = %err, "request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error.",
                )
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
