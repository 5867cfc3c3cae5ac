//! Snapshot error types.

use crate::{PostId, RemoteError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot file not found.
    #[error("Snapshot not found: {}", .0.display())]
    NotFound(PathBuf),

    /// No snapshot exists for a post field.
    #[error("No snapshot for post {post_id} ({field})")]
    NoSnapshotFor { post_id: PostId, field: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file is not valid UTF-8 text.
    #[error("Snapshot {} is not valid UTF-8", .0.display())]
    NotText(PathBuf),

    /// Invalid snapshot key or file name.
    #[error("Invalid snapshot key: {0}")]
    InvalidKey(String),

    /// Snapshot belongs to a different post than the one being restored.
    #[error("Snapshot {} belongs to post {found}, not {expected}", path.display())]
    PostMismatch {
        path: PathBuf,
        expected: PostId,
        found: PostId,
    },

    /// The remote collaborator rejected or failed the call.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Operation failed.
    #[error("Snapshot operation failed: {0}")]
    OperationFailed(String),
}

impl SnapshotError {
    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey(message.into())
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed(message.into())
    }

    /// Whether this error was raised before any remote call was attempted.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Remote(_))
    }
}
