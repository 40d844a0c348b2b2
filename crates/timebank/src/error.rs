//! Error types for time bank operations.
//!
//! Errors only describe rejected input. A task that was armed always
//! reports its outcome through its callback.

use thiserror::Error;

/// Result type alias for time bank operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Time bank error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No callback was supplied, or the delay cannot be represented as a due time.
    #[error("timebank: invalid parameters")]
    InvalidParameters,

    /// The requested deadline is already in the past.
    #[error("timebank: invalid deadline")]
    InvalidDeadline,

    /// The slot could not bind to a tokio runtime.
    #[error("timebank: no tokio runtime available: {reason}")]
    RuntimeUnavailable { reason: String },

    /// Configuration could not be parsed.
    #[error("timebank: failed to parse config: {reason}")]
    ConfigParseFailed { reason: String },
}

impl Error {
    /// Create a runtime unavailable error.
    pub fn runtime_unavailable(reason: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a config parse error.
    pub fn config_parse_failed(reason: impl Into<String>) -> Self {
        Self::ConfigParseFailed {
            reason: reason.into(),
        }
    }

    /// Check if the error was caused by caller input.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidParameters | Self::InvalidDeadline)
    }
}
