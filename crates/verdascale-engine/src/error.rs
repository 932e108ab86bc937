//! Engine error types.

use std::time::Duration;

use thiserror::Error;
use verdascale_cloud::CloudError;
use verdascale_config::ConfigError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to the host by engine operations.
///
/// None of these terminate the process; the host decides whether and
/// when to retry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node group {0} is not registered")]
    UnknownGroup(String),

    #[error("{op} must be called with a positive count, got {count}")]
    InvalidCount { op: &'static str, count: i64 },

    #[error("size increase too large for group {group}: desired {desired}, max {max}")]
    SizeExceedsMax { group: String, desired: u32, max: u32 },

    #[error("removing {count} of {active} active instances would take group {group} below min size {min}")]
    WouldViolateMinSize {
        group: String,
        active: u32,
        count: u32,
        min: u32,
    },

    #[error("cannot remove {requested} instances from group {group}: only {active} active")]
    InsufficientInstances {
        group: String,
        active: u32,
        requested: u32,
    },

    #[error("failure backoff active for group {group}, retry in {remaining:?}")]
    FailureBackoffActive { group: String, remaining: Duration },

    #[error("instance type {instance_type} has no capacity in any of {locations:?}")]
    NoCapacity {
        instance_type: String,
        locations: Vec<String>,
    },

    #[error("no image configured for instance type {instance_type}")]
    MissingImage { instance_type: String },

    #[error("instance {0} not found")]
    InstanceNotFound(String),

    #[error("failed to {op} {failed}/{requested} instances in group {group}: {}", errors.join("; "))]
    PartialScale {
        group: String,
        op: &'static str,
        failed: u32,
        requested: u32,
        errors: Vec<String>,
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether the host may simply try again later.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::FailureBackoffActive { .. } | EngineError::NoCapacity { .. } => true,
            EngineError::Cloud(e) => e.is_retryable(),
            _ => false,
        }
    }
}
