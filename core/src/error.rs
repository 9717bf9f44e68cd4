//! Error types for engine construction and operation resolution.
//!
//! The update engine itself is total: malformed events are no-ops, and remote
//! failures are data carried by error events. The errors here cover the two
//! places where failing loudly is correct:
//!
//! - [`ConfigError`]: an engine was configured without a required option.
//! - [`OperationError`]: a caller-supplied formatter or schema could not
//!   produce a usable payload from a successful response.

use crate::normalize::NormalizeError;
use thiserror::Error;

/// Errors raised while building an [`EntityConfig`](crate::config::EntityConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required option was not supplied (or was empty).
    #[error("Missing required option: {0}")]
    MissingOption(&'static str),

    /// The prefix ends in a known suffix, so some of its event names would
    /// parse under another prefix (`FOO_SET` + `DATA` reads as `FOO` + `SET_DATA`).
    #[error("Ambiguous action prefix: {0}")]
    AmbiguousPrefix(String),
}

/// Error returned by a response formatter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FormatError {
    message: String,
}

impl FormatError {
    /// Create a format error with a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur while turning an operation outcome into events.
#[derive(Error, Debug)]
pub enum OperationError {
    /// The formatter rejected the response.
    #[error("Formatter failed: {0}")]
    Format(#[from] FormatError),

    /// The schema normalizer rejected the (formatted) response.
    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    /// The formatted or normalized value does not have the shape of an event payload.
    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}
