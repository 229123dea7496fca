//! Canonical tool definitions.
//!
//! A [`ToolDef`] describes one invocable tool in the merged catalog,
//! regardless of whether it is implemented in-process or discovered from a
//! tool-protocol server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a tool's implementation lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolSource {
    /// Implemented in-process.
    Builtin,
    /// Discovered from a tool-protocol server.
    Mcp {
        /// Normalized server name the tool was discovered from.
        server: String,
    },
}

impl ToolSource {
    /// True if the tool is dispatched over the tool protocol.
    pub fn is_mcp(&self) -> bool {
        matches!(self, ToolSource::Mcp { .. })
    }

    /// The server name for protocol tools, or `"builtin"`.
    pub fn server_name(&self) -> &str {
        match self {
            ToolSource::Builtin => "builtin",
            ToolSource::Mcp { server } => server,
        }
    }
}

/// One entry in the canonical tool catalog.
///
/// `name` is unique within a merged catalog; `id` is stable across renames
/// (`builtin:<name>` for built-ins, `<server-id>:<raw-name>` for discovered
/// tools).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub source: ToolSource,
}

impl ToolDef {
    /// Create a definition for an in-process tool.
    pub fn builtin(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        let name = name.into();
        Self {
            id: format!("builtin:{name}"),
            name,
            description: description.into(),
            input_schema: schema,
            source: ToolSource::Builtin,
        }
    }

    /// Create a definition for a tool discovered from a protocol server.
    pub fn discovered(
        server_id: &str,
        server: impl Into<String>,
        raw_name: &str,
        description: impl Into<String>,
        schema: Value,
    ) -> Self {
        let server = server.into();
        Self {
            id: format!("{server_id}:{raw_name}"),
            name: format!("{server}.{raw_name}"),
            description: description.into(),
            input_schema: schema,
            source: ToolSource::Mcp { server },
        }
    }

    /// The tool name as the originating server knows it (no server prefix).
    pub fn raw_name(&self) -> &str {
        match &self.source {
            ToolSource::Builtin => &self.name,
            ToolSource::Mcp { server } => self
                .name
                .strip_prefix(server.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(&self.name),
        }
    }
}
