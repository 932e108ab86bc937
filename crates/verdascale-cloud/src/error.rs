//! Cloud API error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors returned by a [`CloudClient`](crate::CloudClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// Transport failure, 5xx, 408 or 429. Worth retrying.
    #[error("transient cloud error{}: {message}", status_suffix(*status))]
    Transient { status: Option<u16>, message: String },

    /// Any other 4xx. Retrying will not help.
    #[error("cloud request rejected{}: {message}", status_suffix(*status))]
    Permanent { status: Option<u16>, message: String },

    #[error("cloud call timed out after {0:?}")]
    Timeout(Duration),
}

fn status_suffix(status: Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl CloudError {
    pub fn transient(message: impl Into<String>) -> Self {
        CloudError::Transient {
            status: None,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        CloudError::Permanent {
            status: None,
            message: message.into(),
        }
    }

    /// Classify an HTTP error response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 | 500..=599 => CloudError::Transient {
                status: Some(status),
                message,
            },
            _ => CloudError::Permanent {
                status: Some(status),
                message,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Transient { .. } | CloudError::Timeout(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Transient { status, .. } | CloudError::Permanent { status, .. } => *status,
            CloudError::Timeout(_) => None,
        }
    }
}
