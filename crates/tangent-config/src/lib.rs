//! Configuration loading for Tangent.
//!
//! One [`EngineConfig`] drives the whole engine: provider selection, the
//! agent loop, tool inclusion and permissions, guardrails, and the tool
//! server. Values come from an optional `tangent.toml`, with environment
//! variables taking precedence and credentials living in the environment
//! only.

pub mod error;
pub mod types;

pub use error::{ConfigError, Result};
pub use types::{
    AgentSection, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, EngineConfig, GuardSection, McpSection,
    ProviderSection, ToolsSection,
};
