//! Tool-protocol (MCP) client for Tangent.
//!
//! This crate speaks JSON-RPC 2.0 with Content-Length framing to a
//! child-process tool server, discovers its tools, and invokes them under a
//! per-call deadline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpSession                                                 │
//! │  - initialize / tools/list / tools/call                     │
//! │  - single in-flight call, lazy restart after failure        │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StdioTransport                                             │
//! │  - Content-Length framed JSON-RPC over child stdio          │
//! │  - reader thread + channel for deadline-bound waits         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol flow
//!
//! 1. Client sends `initialize` with a protocol version and capabilities
//! 2. Server responds with its capabilities and identity
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`
//!
//! If no external server command is configured
//! ([`ServerLaunch::from_env`]), the bundled `tangent-tool-server` binary is
//! launched instead, giving local and external tools a uniform path.

pub mod error;
pub mod launch;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{McpError, Result};
pub use launch::{ServerLaunch, split_command};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION,
    ServerCapabilities, ServerInfo, ToolContent, ToolInfo,
};
pub use session::McpSession;
pub use transport::StdioTransport;
