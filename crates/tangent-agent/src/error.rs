//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Provider backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] tangent_llm::LlmError),

    /// Guardrail gate error. The gate never allows silently, so an
    /// unavailable gate surfaces here and the exchange does not run.
    #[error("Guardrail error: {0}")]
    Guard(#[from] tangent_guard::GuardError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Concurrency limit reached; the exchange was not admitted.
    #[error("Engine busy: concurrency limit reached")]
    Busy,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::tool("connection refused");
        assert!(err.to_string().contains("Tool error"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_busy_display() {
        assert!(AgentError::Busy.to_string().contains("concurrency limit"));
    }
}
