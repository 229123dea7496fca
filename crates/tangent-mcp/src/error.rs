//! Error types for tool-protocol operations.

use thiserror::Error;

/// Result type for tool-protocol operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for tool-protocol operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to spawn the tool server process.
    #[error("failed to spawn tool server: {0}")]
    SpawnFailed(String),

    /// Failed to communicate with the tool server.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC protocol error (bad framing, mismatched id, malformed reply).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server returned an error response.
    #[error("server error {code}: {message}")]
    ServerError {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Session not started or handshake incomplete.
    #[error("session not initialized")]
    NotInitialized,

    /// Server closed the connection or the process exited.
    #[error("tool server process exited")]
    ProcessExited,

    /// Timed out waiting for a response.
    #[error("timed out after {0:?} waiting for tool server response")]
    Timeout(std::time::Duration),
}

impl McpError {
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn server_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
            data,
        }
    }

    /// True when the session should be torn down and lazily restarted.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Protocol(_)
                | Self::Io(_)
                | Self::ProcessExited
                | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = McpError::spawn_failed("command not found");
        assert!(err.to_string().contains("spawn"));

        let err = McpError::server_error(-32601, "Method not found", None);
        assert!(err.to_string().contains("-32601"));
        assert!(err.to_string().contains("Method not found"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(McpError::Timeout(Duration::from_secs(15)).is_fatal_to_session());
        assert!(McpError::ProcessExited.is_fatal_to_session());
        assert!(McpError::protocol("id mismatch").is_fatal_to_session());
        assert!(!McpError::server_error(-32602, "bad params", None).is_fatal_to_session());
        assert!(!McpError::NotInitialized.is_fatal_to_session());
    }
}
