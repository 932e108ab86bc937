//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading the adapter configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid node group spec {spec:?}: {reason}")]
    GroupSpec { spec: String, reason: String },

    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn group_spec(spec: &str, reason: impl Into<String>) -> Self {
        ConfigError::GroupSpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}
