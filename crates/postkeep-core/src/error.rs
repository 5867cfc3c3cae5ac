//! Error types for the core crate.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] postkeep_snapshot::SnapshotError),

    /// Remote error outside of a snapshot operation.
    #[error("remote error: {0}")]
    Remote(#[from] postkeep_snapshot::RemoteError),

    /// Site client error.
    #[error("site error: {0}")]
    Cms(#[from] postkeep_cms::CmsError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regular expression.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Portfolio mirror file has an unexpected shape.
    #[error("invalid mirror file {path}: {message}")]
    InvalidMirror { path: String, message: String },
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// A required setting is missing.
    #[error("missing setting: {0}")]
    Missing(String),

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },

    /// Invalid path (e.g., could not determine config directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_wraps_into_core() {
        let err = CoreError::from(ConfigError::Missing("site.url".to_string()));
        assert_eq!(err.to_string(), "config error: missing setting: site.url");
    }

    #[test]
    fn pattern_error_displays() {
        #[allow(clippy::invalid_regex)]
        let re_err = regex::Regex::new("(unclosed").unwrap_err();
        let err = CoreError::from(re_err);
        assert!(err.to_string().starts_with("invalid pattern"));
    }
}
