//! CMS client error types.

use postkeep_snapshot::RemoteError;
use thiserror::Error;

/// Result type for CMS operations.
pub type CmsResult<T> = Result<T, CmsError>;

/// Errors that can occur while talking to the site.
#[derive(Debug, Error)]
pub enum CmsError {
    /// HTTP request failed before a response arrived, or the body could not be read.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The site answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Site URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Site configuration is incomplete.
    #[error("Invalid site configuration: {0}")]
    InvalidConfig(String),

    /// An update with no fields was requested.
    #[error("Update for post {0} has no fields")]
    EmptyUpdate(u64),
}

impl CmsError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the site reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<CmsError> for RemoteError {
    fn from(err: CmsError) -> Self {
        match err {
            CmsError::Status { status, body } => RemoteError::Status { code: status, body },
            CmsError::RequestFailed(e) if e.is_decode() => {
                RemoteError::InvalidResponse(e.to_string())
            }
            CmsError::RequestFailed(e) => RemoteError::Transport(e.to_string()),
            other => RemoteError::InvalidResponse(other.to_string()),
        }
    }
}
