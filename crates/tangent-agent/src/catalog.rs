//! The merged tool catalog.
//!
//! A [`ToolCatalog`] merges the built-in tools with tools discovered from an
//! attached tool-protocol server, resolves colloquial aliases, enforces the
//! permission profile, and dispatches calls by source. Every dispatch records
//! a `tool.call` trace event.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tangent_mcp::{McpSession, ServerLaunch};
use tangent_types::{PermissionProfile, ToolDef, ToolSource, TraceEventBody, TraceSink};

use crate::tool::{OutputConfig, Tool, ToolCategory, ToolContext, ToolResult};
use crate::tools::builtin_tools;

/// Stable server identifier: first 12 hex chars of SHA-256 over `name:command`.
pub fn server_id(name: &str, command: &str) -> String {
    let digest = Sha256::digest(format!("{name}:{command}").as_bytes());
    hex::encode(&digest[..6])
}

// ─────────────────────────────────────────────────────────────────────────────
// Aliases
// ─────────────────────────────────────────────────────────────────────────────

/// Colloquial names mapped to canonical tool names.
pub const ALIASES: &[(&str, &str)] = &[
    ("curl", "local_curl"),
    ("fetch", "web_fetch"),
    ("http_get", "web_fetch"),
    ("search", "brave_search"),
    ("ls", "local_ls"),
    ("dir", "local_ls"),
    ("pwd", "local_pwd"),
    ("whoami", "local_whoami"),
    ("du", "local_file_sizes"),
    ("file_sizes", "local_file_sizes"),
    ("time", "current_time"),
    ("now", "current_time"),
    ("calc", "calculator"),
    ("uuid", "uuid_generate"),
    ("hash", "hash_text"),
    ("base64", "base64_codec"),
    ("dns", "dns_lookup"),
    ("head", "http_head"),
];

/// Map a requested name to its canonical form.
pub fn resolve_alias(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one catalog dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The (sanitised) tool result.
    pub result: ToolResult,
    /// True when the call repeated the previous one and was answered from
    /// its cached output.
    pub repeated: bool,
}

struct LastCall {
    name: String,
    arguments: Value,
    result: ToolResult,
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Merged catalog of built-in and discovered tools.
pub struct ToolCatalog {
    builtins: HashMap<String, Arc<dyn Tool>>,
    session: Option<Arc<McpSession>>,
    mcp_server_id: Option<String>,
    discovered: Mutex<Option<Vec<ToolDef>>>,
    discovery_error: Mutex<Option<String>>,
    profile: PermissionProfile,
    ctx: ToolContext,
    output_caps: BTreeMap<String, usize>,
    last_call: Mutex<Option<LastCall>>,
}

impl ToolCatalog {
    /// Create a catalog with the built-in tools only.
    pub fn new(profile: PermissionProfile, ctx: ToolContext) -> Self {
        let builtins = builtin_tools()
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();
        Self {
            builtins,
            session: None,
            mcp_server_id: None,
            discovered: Mutex::new(None),
            discovery_error: Mutex::new(None),
            profile,
            ctx,
            output_caps: BTreeMap::new(),
            last_call: Mutex::new(None),
        }
    }

    /// Attach a tool-protocol server whose tools are merged in on discovery.
    pub fn with_server(mut self, launch: ServerLaunch) -> Self {
        self.mcp_server_id = Some(server_id(&launch.name, &launch.command));
        self.session = Some(Arc::new(McpSession::new(launch)));
        self
    }

    /// Override per-tool output size caps (bytes, keyed by tool name).
    pub fn with_output_caps(mut self, caps: BTreeMap<String, usize>) -> Self {
        self.output_caps = caps;
        self
    }

    /// Replace a built-in (or add an extra in-process tool). Used by tests.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.builtins.insert(tool.name().to_string(), tool);
    }

    /// The active permission profile.
    pub fn profile(&self) -> PermissionProfile {
        self.profile
    }

    /// Run (or re-run) discovery against the attached server.
    ///
    /// Discovery failure is recorded, not fatal: the catalog still serves the
    /// built-ins, and the error shows up in the toolset snapshot.
    pub async fn refresh(&self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let Some(server_id) = self.mcp_server_id.clone() else {
            return;
        };
        let server_name = session.name().to_string();

        let listed =
            tokio::task::spawn_blocking(move || session.list_tools().map(|tools| (session, tools)))
                .await;

        match listed {
            Ok(Ok((session, tools))) => {
                let defs: Vec<ToolDef> = tools
                    .into_iter()
                    .map(|info| {
                        ToolDef::discovered(
                            &server_id,
                            session.name(),
                            &info.name,
                            info.description.unwrap_or_default(),
                            info.input_schema
                                .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                        )
                    })
                    .collect();
                tracing::debug!(server = %server_name, count = defs.len(), "tool discovery complete");
                *self.discovered.lock() = Some(defs);
                *self.discovery_error.lock() = None;
            }
            Ok(Err(e)) => {
                tracing::warn!(server = %server_name, error = %e, "tool discovery failed");
                *self.discovered.lock() = Some(Vec::new());
                *self.discovery_error.lock() = Some(e.to_string());
            }
            Err(e) => {
                *self.discovered.lock() = Some(Vec::new());
                *self.discovery_error.lock() = Some(format!("discovery task failed: {e}"));
            }
        }
    }

    /// Run discovery once; later calls reuse the cache until [`refresh`].
    ///
    /// [`refresh`]: Self::refresh
    pub async fn ensure_discovered(&self) {
        let already = self.discovered.lock().is_some();
        if !already && self.session.is_some() {
            self.refresh().await;
        }
    }

    /// The merged tool definitions: built-ins first, then discovered tools.
    pub fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self
            .builtins
            .values()
            .map(|t| ToolDef::builtin(t.name(), t.description(), t.parameters()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(discovered) = &*self.discovered.lock() {
            defs.extend(discovered.iter().cloned());
        }
        defs
    }

    /// Record a `toolset.snapshot` trace event describing the current catalog.
    pub fn record_snapshot(&self, trace: &dyn TraceSink) {
        let defs = self.definitions();
        let servers: Vec<Value> = self
            .session
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name(),
                    "state": s.state_name()
                })
            })
            .collect();
        trace.record(TraceEventBody::ToolsetSnapshot {
            server_count: servers.len(),
            tool_count: defs.len(),
            servers,
            tools: defs
                .iter()
                .map(|d| serde_json::to_value(d).unwrap_or(Value::Null))
                .collect(),
            error: self.discovery_error.lock().clone(),
        });
    }

    /// Look up a tool definition by (possibly aliased) name.
    pub fn resolve(&self, requested: &str) -> Option<ToolDef> {
        let canonical = resolve_alias(requested);
        self.definitions().into_iter().find(|d| d.name == canonical)
    }

    /// Dispatch one tool call.
    ///
    /// Unknown names, permission denials, and execution failures all come
    /// back as error results so the loop can fold them into the conversation.
    pub async fn dispatch(
        &self,
        requested: &str,
        arguments: Value,
        trace: &dyn TraceSink,
    ) -> DispatchOutcome {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let canonical = resolve_alias(requested).to_string();

        let Some(def) = self.resolve(&canonical) else {
            let message = format!("Unknown tool '{}'", requested);
            self.record_call(trace, &invocation_id, &canonical, &canonical, 0, Some(&message));
            return DispatchOutcome {
                result: ToolResult::error(message),
                repeated: false,
            };
        };

        if let Some(denial) = self.permission_denial(&def) {
            self.record_call(trace, &invocation_id, &def.id, &def.name, 0, Some(&denial));
            return DispatchOutcome {
                result: ToolResult::error(denial),
                repeated: false,
            };
        }

        // Identical back-to-back calls are answered from the previous output.
        if let Some(last) = &*self.last_call.lock()
            && last.name == def.name
            && last.arguments == arguments
        {
            tracing::debug!(tool = %def.name, "repeated tool call short-circuited");
            return DispatchOutcome {
                result: last.result.clone(),
                repeated: true,
            };
        }

        let started = Instant::now();
        let raw_result = match &def.source {
            ToolSource::Builtin => self.execute_builtin(&def.name, arguments.clone()).await,
            ToolSource::Mcp { .. } => self.execute_mcp(&def, arguments.clone()).await,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = raw_result.sanitize(&self.output_config_for(&def.name));
        let error_text = match &result {
            ToolResult::Error { message } => Some(message.clone()),
            _ => None,
        };
        self.record_call(
            trace,
            &invocation_id,
            &def.id,
            &def.name,
            duration_ms,
            error_text.as_deref(),
        );

        *self.last_call.lock() = Some(LastCall {
            name: def.name.clone(),
            arguments,
            result: result.clone(),
        });

        DispatchOutcome {
            result,
            repeated: false,
        }
    }

    /// Forget the repeated-call cache (between exchanges).
    pub fn reset_call_cache(&self) {
        *self.last_call.lock() = None;
    }

    async fn execute_builtin(&self, name: &str, arguments: Value) -> ToolResult {
        let Some(tool) = self.builtins.get(name) else {
            return ToolResult::error(format!("Unknown tool '{}'", name));
        };
        match tool.execute(arguments, &self.ctx).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn execute_mcp(&self, def: &ToolDef, arguments: Value) -> ToolResult {
        let Some(session) = self.session.clone() else {
            return ToolResult::error("No tool server attached");
        };
        let raw_name = def.raw_name().to_string();
        let args = if arguments.is_null() { None } else { Some(arguments) };

        let called =
            tokio::task::spawn_blocking(move || session.call_tool(&raw_name, args)).await;

        match called {
            Ok(Ok(result)) => {
                let text = result.text().unwrap_or_default();
                if result.is_error() {
                    ToolResult::error(if text.is_empty() {
                        "tool call failed".to_string()
                    } else {
                        text
                    })
                } else {
                    ToolResult::text(text)
                }
            }
            Ok(Err(e)) => ToolResult::error(e.to_string()),
            Err(e) => ToolResult::error(format!("tool call task failed: {e}")),
        }
    }

    /// Why the active profile refuses this tool, if it does.
    fn permission_denial(&self, def: &ToolDef) -> Option<String> {
        let category = match &def.source {
            ToolSource::Builtin => self.builtins.get(&def.name).map(|t| t.category()),
            // Protocol tools run in a local child process.
            ToolSource::Mcp { .. } => None,
        };

        let denied = match self.profile {
            PermissionProfile::Standard | PermissionProfile::NetworkOpen => false,
            PermissionProfile::ReadOnly => def.name == "local_curl",
            PermissionProfile::LocalOnly => {
                category == Some(ToolCategory::Network) || def.name == "local_curl"
            }
        };

        denied.then(|| {
            format!(
                "Permission denied: tool '{}' is not permitted under the '{}' profile",
                def.name, self.profile
            )
        })
    }

    /// Per-tool output sanitisation limits. A configured cap wins over the
    /// built-in per-tool defaults.
    fn output_config_for(&self, name: &str) -> OutputConfig {
        if let Some(cap) = self.output_caps.get(name) {
            return OutputConfig::with_max_size(*cap);
        }
        match name {
            "web_fetch" => OutputConfig::for_web_fetch(),
            "local_ls" | "local_file_sizes" => OutputConfig::for_filesystem(),
            _ => OutputConfig::default(),
        }
    }

    fn record_call(
        &self,
        trace: &dyn TraceSink,
        invocation_id: &str,
        tool_id: &str,
        tool_name: &str,
        duration_ms: u64,
        error: Option<&str>,
    ) {
        trace.record(TraceEventBody::ToolCall {
            invocation_id: invocation_id.to_string(),
            tool_id: tool_id.to_string(),
            tool_name: tool_name.to_string(),
            duration_ms,
            ok: error.is_none(),
            error: error.map(str::to_string),
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::MockTool;
    use serde_json::json;
    use tangent_types::TraceRecorder;

    fn catalog(profile: PermissionProfile) -> ToolCatalog {
        ToolCatalog::new(profile, ToolContext::default())
    }

    #[test]
    fn test_server_id_is_stable_and_short() {
        let a = server_id("local-tools", "tangent-tool-server");
        let b = server_id("local-tools", "tangent-tool-server");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, server_id("other", "tangent-tool-server"));
    }

    #[test]
    fn test_alias_resolution() {
        assert_eq!(resolve_alias("curl"), "local_curl");
        assert_eq!(resolve_alias("calc"), "calculator");
        assert_eq!(resolve_alias("dir"), "local_ls");
        assert_eq!(resolve_alias("calculator"), "calculator");
        assert_eq!(resolve_alias("never_heard_of_it"), "never_heard_of_it");
    }

    #[test]
    fn test_definitions_contain_all_builtins() {
        let catalog = catalog(PermissionProfile::Standard);
        let defs = catalog.definitions();
        assert_eq!(defs.len(), 17);
        assert!(defs.iter().all(|d| d.source == ToolSource::Builtin));
        assert!(defs.iter().any(|d| d.name == "calculator"));
        assert!(defs.iter().any(|d| d.id == "builtin:web_fetch"));
    }

    #[tokio::test]
    async fn test_dispatch_builtin_via_alias() {
        let catalog = catalog(PermissionProfile::Standard);
        let trace = TraceRecorder::new();

        let outcome = catalog
            .dispatch("calc", json!({"expression": "2 + 2"}), &trace)
            .await;
        assert!(!outcome.repeated);
        match outcome.result {
            ToolResult::Json { content } => assert_eq!(content["result"], 4.0),
            other => panic!("unexpected: {other:?}"),
        }

        let events = trace.events();
        assert_eq!(events.len(), 1);
        match &events[0].body {
            TraceEventBody::ToolCall { tool_name, ok, .. } => {
                assert_eq!(tool_name, "calculator");
                assert!(ok);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let catalog = catalog(PermissionProfile::Standard);
        let trace = TraceRecorder::new();

        let outcome = catalog.dispatch("no_such_tool", json!({}), &trace).await;
        assert!(outcome.result.is_error());

        let events = trace.events();
        match &events[0].body {
            TraceEventBody::ToolCall { ok, error, .. } => {
                assert!(!ok);
                assert!(error.as_deref().unwrap().contains("Unknown tool"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_only_denies_local_curl() {
        let catalog = catalog(PermissionProfile::ReadOnly);
        let trace = TraceRecorder::new();

        let outcome = catalog
            .dispatch("local_curl", json!({"url": "https://example.com"}), &trace)
            .await;
        assert!(outcome.result.is_error());
        assert!(outcome.result.to_model_content().contains("Permission denied"));

        // Pure tools still run.
        let outcome = catalog
            .dispatch("text_stats", json!({"text": "hi"}), &trace)
            .await;
        assert!(!outcome.result.is_error());
    }

    #[tokio::test]
    async fn test_local_only_denies_network_tools() {
        let catalog = catalog(PermissionProfile::LocalOnly);
        let trace = TraceRecorder::new();

        for name in ["web_fetch", "dns_lookup", "http_head", "brave_search", "weather", "local_curl"] {
            let outcome = catalog.dispatch(name, json!({}), &trace).await;
            assert!(
                outcome.result.to_model_content().contains("Permission denied"),
                "{name} should be denied"
            );
        }

        let outcome = catalog
            .dispatch("local_whoami", json!({}), &trace)
            .await;
        assert!(!outcome.result.is_error());
    }

    #[tokio::test]
    async fn test_repeated_call_short_circuits() {
        let mut catalog = catalog(PermissionProfile::Standard);
        catalog.register(Arc::new(
            MockTool::new("probe").with_response(ToolResult::text("first")),
        ));
        let trace = TraceRecorder::new();

        let first = catalog.dispatch("probe", json!({"q": 1}), &trace).await;
        assert!(!first.repeated);

        let second = catalog.dispatch("probe", json!({"q": 1}), &trace).await;
        assert!(second.repeated);
        assert_eq!(second.result.to_model_content(), "first");

        // Different arguments invoke the tool again.
        let third = catalog.dispatch("probe", json!({"q": 2}), &trace).await;
        assert!(!third.repeated);

        // Only two real invocations were traced.
        let calls = trace
            .events()
            .iter()
            .filter(|e| matches!(e.body, TraceEventBody::ToolCall { .. }))
            .count();
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_configured_cap_truncates_dispatch_output() {
        let mut catalog = catalog(PermissionProfile::Standard)
            .with_output_caps(BTreeMap::from([("verbose".to_string(), 200usize)]));
        catalog.register(Arc::new(
            MockTool::new("verbose").with_response(ToolResult::text("x".repeat(5000))),
        ));
        let trace = TraceRecorder::new();

        let outcome = catalog.dispatch("verbose", json!({}), &trace).await;
        let content = outcome.result.to_model_content();
        assert!(content.contains("[Output truncated"));
        assert!(content.len() < 5000);

        // Tools without a configured cap keep their defaults.
        let config = catalog.output_config_for("web_fetch");
        assert_eq!(config.max_size_bytes, 200 * 1024);
        let config = catalog.output_config_for("verbose");
        assert_eq!(config.max_size_bytes, 200);
    }

    #[tokio::test]
    async fn test_reset_call_cache() {
        let mut catalog = catalog(PermissionProfile::Standard);
        catalog.register(Arc::new(MockTool::new("probe")));
        let trace = TraceRecorder::new();

        catalog.dispatch("probe", json!({}), &trace).await;
        catalog.reset_call_cache();
        let outcome = catalog.dispatch("probe", json!({}), &trace).await;
        assert!(!outcome.repeated);
    }

    #[test]
    fn test_snapshot_records_counts() {
        let catalog = catalog(PermissionProfile::Standard);
        let trace = TraceRecorder::new();
        catalog.record_snapshot(&trace);

        let events = trace.events();
        match &events[0].body {
            TraceEventBody::ToolsetSnapshot {
                server_count,
                tool_count,
                error,
                ..
            } => {
                assert_eq!(*server_count, 0);
                assert_eq!(*tool_count, 17);
                assert!(error.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
