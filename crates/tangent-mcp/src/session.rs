//! Tool-server session: handshake, discovery, invocation, lazy restart.
//!
//! A [`McpSession`] owns one child-process tool server. The session moves
//! through an explicit state machine:
//!
//! ```text
//! Unstarted ──start──> Ready ──fatal call error──> Failed
//!     ^                  │                            │
//!     │                  └──shutdown──> Closed        │
//!     └───────────lazy restart on next use────────────┘
//! ```
//!
//! At most one request is in flight at a time: callers hold the state lock
//! for the duration of a call, which keeps id correlation trivial. A call
//! that times out, hits a process exit, or sees a mismatched response id
//! fails that call and tears the session down; the next call respawns the
//! server and redoes the handshake. `Closed` (explicit shutdown) is terminal.

use std::time::Duration;

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::launch::ServerLaunch;
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, ServerInfo, ToolInfo,
};
use crate::transport::StdioTransport;

enum SessionState {
    Unstarted,
    Ready(Box<ActiveSession>),
    Failed,
    Closed,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Unstarted => "unstarted",
            SessionState::Ready(_) => "ready",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        }
    }
}

struct ActiveSession {
    transport: StdioTransport,
    server_info: ServerInfo,
    next_id: u64,
}

/// A session with a single tool-protocol server.
pub struct McpSession {
    launch: ServerLaunch,
    state: std::sync::Mutex<SessionState>,
}

impl McpSession {
    /// Create a session. The server is not spawned until first use.
    pub fn new(launch: ServerLaunch) -> Self {
        Self {
            launch,
            state: std::sync::Mutex::new(SessionState::Unstarted),
        }
    }

    /// The configured server name.
    pub fn name(&self) -> &str {
        &self.launch.name
    }

    /// The launch configuration.
    pub fn launch(&self) -> &ServerLaunch {
        &self.launch
    }

    /// Current state name, for diagnostics.
    pub fn state_name(&self) -> &'static str {
        self.lock_state().name()
    }

    /// Server identity from the last completed handshake, if any.
    pub fn server_info(&self) -> Option<ServerInfo> {
        match &*self.lock_state() {
            SessionState::Ready(active) => Some(active.server_info.clone()),
            _ => None,
        }
    }

    /// Spawn and handshake eagerly. Calls do this lazily on their own.
    pub fn start(&self) -> Result<ServerInfo> {
        let mut state = self.lock_state();
        self.ensure_ready(&mut state)?;
        match &*state {
            SessionState::Ready(active) => Ok(active.server_info.clone()),
            _ => Err(McpError::NotInitialized),
        }
    }

    /// List the tools the server advertises.
    pub fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let result = self.request("tools/list", None)?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        tracing::debug!(
            server = %self.launch.name,
            tool_count = list.tools.len(),
            "listed tools"
        );
        Ok(list.tools)
    }

    /// Invoke a tool by its server-side name.
    pub fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result = self.request("tools/call", Some(serde_json::to_value(&params)?))?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(server = %self.launch.name, tool = %name, "tool call returned error");
        } else {
            tracing::debug!(server = %self.launch.name, tool = %name, "tool call succeeded");
        }
        Ok(call_result)
    }

    /// Terminate the server process. The session cannot be reused after this.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        if let SessionState::Ready(active) = &mut *state {
            tracing::info!(server = %self.launch.name, "shutting down tool server");
            active.transport.shutdown();
        }
        *state = SessionState::Closed;
    }

    /// Whether the child process is currently running.
    pub fn is_connected(&self) -> bool {
        match &mut *self.lock_state() {
            SessionState::Ready(active) => active.transport.is_alive(),
            _ => false,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        // Lock poisoning only happens if a panic escaped mid-call; the state
        // is still coherent enough to tear down.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issue one request, lazily (re)starting the session first.
    fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut state = self.lock_state();
        self.ensure_ready(&mut state)?;

        let SessionState::Ready(active) = &mut *state else {
            return Err(McpError::NotInitialized);
        };

        let id = active.next_id;
        active.next_id += 1;
        let request = JsonRpcRequest::new(id, method, params);

        match active.transport.send_request(&request, self.launch.timeout) {
            Ok(response) => response
                .into_result()
                .map_err(|e| McpError::server_error(e.code, e.message, e.data)),
            Err(e) => {
                if e.is_fatal_to_session() {
                    tracing::warn!(
                        server = %self.launch.name,
                        method = %method,
                        error = %e,
                        "session failed, will restart on next use"
                    );
                    *state = SessionState::Failed;
                }
                Err(e)
            }
        }
    }

    /// Transition Unstarted/Failed to Ready by spawning and handshaking.
    fn ensure_ready(&self, state: &mut SessionState) -> Result<()> {
        match state {
            SessionState::Ready(_) => return Ok(()),
            SessionState::Closed => {
                return Err(McpError::transport("session has been shut down"));
            }
            SessionState::Unstarted | SessionState::Failed => {}
        }

        match self.spawn_and_handshake() {
            Ok(active) => {
                *state = SessionState::Ready(Box::new(active));
                Ok(())
            }
            Err(e) => {
                *state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn spawn_and_handshake(&self) -> Result<ActiveSession> {
        let mut transport = StdioTransport::spawn(
            &self.launch.command,
            &self.launch.args,
            &self.launch.env,
        )?;

        let init = JsonRpcRequest::new(
            1,
            "initialize",
            Some(serde_json::to_value(InitializeParams::default())?),
        );
        let response = transport.send_request(&init, self.launch.timeout)?;
        let result = response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))?;
        let init_result: InitializeResult = serde_json::from_value(result)?;

        transport.send_notification(&JsonRpcNotification::new(
            "notifications/initialized",
            Some(serde_json::json!({})),
        ))?;

        tracing::info!(
            server = %init_result.server_info.name,
            version = %init_result.server_info.version,
            protocol = %init_result.protocol_version,
            "tool server initialized"
        );

        Ok(ActiveSession {
            transport,
            server_info: init_result.server_info,
            // id 1 was the handshake
            next_id: 2,
        })
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("server", &self.launch.name)
            .field("state", &self.state_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(command: &str) -> ServerLaunch {
        ServerLaunch::new("test", command).with_timeout(Duration::from_millis(200))
    }

    #[test]
    fn test_session_starts_unstarted() {
        let session = McpSession::new(launch("whatever"));
        assert_eq!(session.state_name(), "unstarted");
        assert!(!session.is_connected());
        assert!(session.server_info().is_none());
    }

    #[test]
    fn test_spawn_failure_leaves_session_restartable() {
        let session = McpSession::new(launch("nonexistent-tool-server-12345"));
        assert!(matches!(
            session.list_tools(),
            Err(McpError::SpawnFailed(_))
        ));
        // Failed is not terminal; the next call retries from scratch.
        assert_eq!(session.state_name(), "failed");
        assert!(matches!(
            session.list_tools(),
            Err(McpError::SpawnFailed(_))
        ));
    }

    #[test]
    fn test_closed_session_rejects_calls() {
        let session = McpSession::new(launch("whatever"));
        session.shutdown();
        assert_eq!(session.state_name(), "closed");
        assert!(matches!(session.list_tools(), Err(McpError::Transport(_))));
    }

    #[test]
    #[cfg(unix)]
    fn test_handshake_timeout_marks_failed() {
        // 'sleep' accepts the frames but never answers the handshake.
        let session = McpSession::new(launch("sleep").with_arg("30"));
        assert!(matches!(session.list_tools(), Err(McpError::Timeout(_))));
        assert_eq!(session.state_name(), "failed");
    }
}
