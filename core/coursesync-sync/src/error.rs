//! Error types for the sync layer.

use coursesync_store::StoreError;
use coursesync_types::{ContentKind, ValidationError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid node configuration (URL, secret, targets).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The peer rejected our credentials, or we rejected theirs.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Network error or unexpected HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A record exists under the stable id but belongs to another kind.
    #[error("content type mismatch: expected {expected}, found {found}")]
    ContentTypeMismatch {
        expected: ContentKind,
        found: ContentKind,
    },

    /// Item failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage error.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A blocking worker task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Maps reqwest failures onto timeout or transport errors.
    pub(crate) fn from_http(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task failed: {err}"))
    }
}
