//! Tool framework for agent capabilities.
//!
//! Defines the [`Tool`] trait implemented by every built-in tool, the
//! [`ToolContext`] handed to executions, the [`ToolResult`] shape folded back
//! into the conversation, and the output sanitisation applied to everything a
//! tool produces before the model sees it.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Helper trait for pulling parameters out of a JSON arguments object.
///
/// Missing-required errors carry a hint so the model can correct itself on
/// the next step.
pub trait ParamExt {
    /// Get a required string parameter.
    fn required_str(&self, name: &'static str, hint: &'static str) -> Result<&str>;

    /// Get an optional string parameter.
    fn optional_str(&self, name: &str) -> Option<&str>;

    /// Get an optional integer parameter with default.
    fn optional_i64(&self, name: &str, default: i64) -> i64;

    /// Get an optional u64 parameter with default.
    fn optional_u64(&self, name: &str, default: u64) -> u64;

    /// Get an optional float parameter.
    fn optional_f64(&self, name: &str) -> Option<f64>;

    /// Get an optional boolean parameter with default.
    fn optional_bool(&self, name: &str, default: bool) -> bool;
}

impl ParamExt for serde_json::Value {
    fn required_str(&self, name: &'static str, hint: &'static str) -> Result<&str> {
        self.get(name).and_then(|v| v.as_str()).ok_or_else(|| {
            crate::error::AgentError::tool(format!("missing required parameter '{name}': {hint}"))
        })
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    fn optional_i64(&self, name: &str, default: i64) -> i64 {
        self.get(name).and_then(|v| v.as_i64()).unwrap_or(default)
    }

    fn optional_u64(&self, name: &str, default: u64) -> u64 {
        self.get(name).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    fn optional_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_f64())
    }

    fn optional_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Category a tool belongs to; permission profiles gate on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// No side effects, no I/O.
    Pure,
    /// Reaches out to the network.
    Network,
    /// Touches the local machine (filesystem, process info, local egress).
    Local,
}

/// Trait for in-process agent tools.
///
/// Each tool defines its parameters as a JSON Schema and implements async
/// execution. Expected failures (bad input, unreachable host) are returned as
/// [`ToolResult::Error`] rather than `Err` so the loop can fold them back to
/// the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of this tool.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema for this tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Which permission category this tool falls under.
    fn category(&self) -> ToolCategory;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Base directory filesystem tools are confined to.
    pub base_dir: PathBuf,
    /// Whether network tools may target private/loopback destinations.
    pub allow_private_network: bool,
}

impl ToolContext {
    /// Create a context rooted at the given directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            allow_private_network: false,
        }
    }

    /// Set whether private-network destinations are permitted.
    pub fn with_private_network(mut self, allow: bool) -> Self {
        self.allow_private_network = allow;
        self
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            allow_private_network: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    /// Successful text output.
    Text { content: String },
    /// Successful JSON output.
    Json { content: serde_json::Value },
    /// Tool execution failed.
    Error { message: String },
}

impl ToolResult {
    /// Create a text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a JSON result.
    pub fn json(content: serde_json::Value) -> Self {
        Self::Json { content }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Get the content as a string for model consumption.
    pub fn to_model_content(&self) -> String {
        match self {
            Self::Text { content } => content.clone(),
            Self::Json { content } => {
                serde_json::to_string_pretty(content).unwrap_or_else(|_| content.to_string())
            }
            Self::Error { message } => format!("Error: {}", message),
        }
    }

    /// Sanitize this result according to the given configuration.
    ///
    /// Enforces the size cap with UTF-8-safe truncation, strips null bytes
    /// and control characters, and rejects binary content.
    pub fn sanitize(self, config: &OutputConfig) -> Self {
        match self {
            Self::Text { content } => match sanitize_output(&content, config) {
                Ok((sanitized, _truncated)) => Self::Text { content: sanitized },
                Err(e) => Self::error(format!("Output sanitization failed: {}", e)),
            },
            Self::Json { content } => {
                let json_str = match serde_json::to_string_pretty(&content) {
                    Ok(s) => s,
                    Err(e) => return Self::error(format!("Failed to serialize JSON: {}", e)),
                };
                match sanitize_output(&json_str, config) {
                    Ok((sanitized, truncated)) => {
                        if truncated {
                            // Truncation breaks the JSON shape; hand it back as text.
                            Self::Text { content: sanitized }
                        } else {
                            match serde_json::from_str(&sanitized) {
                                Ok(v) => Self::Json { content: v },
                                Err(_) => Self::Text { content: sanitized },
                            }
                        }
                    }
                    Err(e) => Self::error(format!("Output sanitization failed: {}", e)),
                }
            }
            Self::Error { message } => {
                let error_config = OutputConfig {
                    max_size_bytes: 10 * 1024,
                    ..config.clone()
                };
                match sanitize_output(&message, &error_config) {
                    Ok((sanitized, _)) => Self::Error { message: sanitized },
                    Err(_) => Self::Error {
                        message: "[Error message contained invalid content]".to_string(),
                    },
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Sanitisation
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum output size in bytes (100KB).
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 100 * 1024;

/// Configuration for sanitizing tool output.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Maximum size in bytes before truncation.
    pub max_size_bytes: usize,
    /// Message to append when output is truncated.
    pub truncation_message: String,
    /// Whether to strip control characters (except newlines, tabs).
    pub strip_control_chars: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_OUTPUT_SIZE,
            truncation_message: "\n\n[Output truncated - exceeded size limit]".to_string(),
            strip_control_chars: true,
        }
    }
}

impl OutputConfig {
    /// Create an output config with the given size limit.
    pub fn with_max_size(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            ..Default::default()
        }
    }

    /// Configuration for web fetch output (200KB).
    pub fn for_web_fetch() -> Self {
        Self::with_max_size(200 * 1024)
    }

    /// Configuration for filesystem tools (500KB).
    pub fn for_filesystem() -> Self {
        Self::with_max_size(500_000)
    }
}

/// Error type for output sanitisation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OutputSanitizationError {
    /// Output appears to be binary data.
    #[error(
        "output appears to be binary data (detected {null_bytes} null bytes in first {checked_bytes} bytes)"
    )]
    BinaryContent {
        null_bytes: usize,
        checked_bytes: usize,
    },
}

/// Sanitize a string according to the output configuration.
///
/// Detects binary content, strips null bytes and control characters, and
/// truncates to the size limit at a char boundary. Returns the sanitized
/// string and whether it was truncated.
pub fn sanitize_output(
    input: &str,
    config: &OutputConfig,
) -> std::result::Result<(String, bool), OutputSanitizationError> {
    // Null-byte density in the first 8KB decides binary vs text.
    let check_len = std::cmp::min(input.len(), 8 * 1024);
    let check_bytes = &input.as_bytes()[..check_len];
    let null_count = check_bytes.iter().filter(|&&b| b == 0).count();
    if null_count > check_len / 100 && null_count > 10 {
        return Err(OutputSanitizationError::BinaryContent {
            null_bytes: null_count,
            checked_bytes: check_len,
        });
    }

    let mut output: String = input.replace('\0', "");
    if config.strip_control_chars {
        output = output
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect();
    }

    let truncated = if output.len() > config.max_size_bytes {
        let mut truncate_at = config.max_size_bytes;
        let msg_len = config.truncation_message.len();
        if truncate_at > msg_len {
            truncate_at -= msg_len;
        }
        while truncate_at > 0 && !output.is_char_boundary(truncate_at) {
            truncate_at -= 1;
        }
        output.truncate(truncate_at);
        output.push_str(&config.truncation_message);
        true
    } else {
        false
    };

    Ok((output, truncated))
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted tool for tests.
pub struct MockTool {
    name: String,
    category: ToolCategory,
    response: ToolResult,
    calls: parking_lot::Mutex<Vec<serde_json::Value>>,
}

impl MockTool {
    /// Create a pure mock tool that returns `"ok"`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: ToolCategory::Pure,
            response: ToolResult::text("ok"),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set the scripted response.
    pub fn with_response(mut self, response: ToolResult) -> Self {
        self.response = response;
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    /// Arguments of every call made so far.
    pub fn calls(&self) -> Vec<serde_json::Value> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Mock tool for tests"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn category(&self) -> ToolCategory {
        self.category
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.lock().push(params);
        Ok(self.response.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
