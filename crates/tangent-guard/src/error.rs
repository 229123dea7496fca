//! Error types for the guardrail gate.

use thiserror::Error;

/// Result type alias using the guardrail error type.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Error type for guardrail operations.
///
/// A gate that cannot decide never silently allows: missing credentials,
/// unreachable services and unexpected statuses all surface as
/// [`GuardError::Unavailable`] and the caller must treat the exchange as
/// blocked.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The policy service could not be consulted.
    #[error("Guardrail service unavailable: {0}")]
    Unavailable(String),

    /// The gate itself is misconfigured.
    #[error("Guardrail configuration error: {0}")]
    Config(String),
}

impl GuardError {
    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<reqwest::Error> for GuardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GuardError::Unavailable(format!("policy check timed out: {}", err))
        } else {
            GuardError::Unavailable(format!("policy service unreachable: {}", err))
        }
    }
}
