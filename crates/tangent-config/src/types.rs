//! Engine configuration mapping to the TOML schema.
//!
//! ```toml
//! [provider]
//! id = "anthropic"
//! model = "claude-sonnet-4-20250514"
//!
//! [agent]
//! max_steps = 3
//!
//! [tools]
//! profile = "standard"
//! mode = "all"
//!
//! [guardrails]
//! mode = "direct"
//!
//! [mcp]
//! command = "my-tool-server --flag"
//! ```
//!
//! Every field has a default, so an absent file or an empty file is a valid
//! configuration. Environment variables override file values; credentials
//! (`ANTHROPIC_API_KEY`, `GUARD_API_KEY`, ...) are env-only and never read
//! from the file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tangent_types::PermissionProfile;

use crate::error::{ConfigError, Result};

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tangent.toml";

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "TANGENT_CONFIG";

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Provider id: `anthropic`, `openai`, or `ollama`.
    pub id: String,
    /// Model override; each provider has its own default.
    pub model: Option<String>,
    /// Base URL override for the provider API.
    pub base_url: Option<String>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            id: "anthropic".to_string(),
            model: None,
            base_url: None,
        }
    }
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Maximum model calls per exchange.
    pub max_steps: u32,
    /// Generation budget per model call.
    pub max_tokens: u32,
    /// Concurrent exchanges admitted before `Busy`.
    pub exchange_limit: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: 3,
            max_tokens: 4096,
            exchange_limit: 4,
        }
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// Whether tools are offered to the model at all.
    pub enabled: bool,
    /// Inclusion mode: `all`, `allowlist`, or `progressive`.
    pub mode: String,
    /// Hard cap on tools per request.
    pub max_tools: usize,
    /// Tool names for `allowlist` mode.
    pub allowlist: Vec<String>,
    /// Permission profile name.
    pub profile: String,
    /// Allow network tools to reach private address ranges.
    pub allow_private_network: bool,
    /// Per-tool output caps in bytes, keyed by tool name.
    pub caps: BTreeMap<String, usize>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: "all".to_string(),
            max_tools: 20,
            allowlist: Vec::new(),
            profile: "standard".to_string(),
            allow_private_network: false,
            caps: BTreeMap::new(),
        }
    }
}

/// `[guardrails]` section. The API key is env-only (`GUARD_API_KEY`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSection {
    /// Whether guardrail checks run at all.
    pub enabled: bool,
    /// `direct` or `proxy`.
    pub mode: String,
    /// Policy endpoint override (direct mode).
    pub endpoint: Option<String>,
    /// Per-conversation correlation header name.
    pub conversation_header: Option<String>,
    /// Policy call timeout in seconds.
    pub timeout_secs: u64,
    /// Proxy base URL (proxy mode).
    pub proxy_base_url: Option<String>,
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: "direct".to_string(),
            endpoint: None,
            conversation_header: None,
            timeout_secs: 15,
            proxy_base_url: None,
        }
    }
}

/// `[mcp]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSection {
    /// Server command line; unset means the bundled server if present.
    pub command: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// When discovery runs: `startup` or `per_exchange`.
    pub refresh: String,
}

impl Default for McpSection {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 15,
            refresh: "startup".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub provider: ProviderSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub guardrails: GuardSection,
    pub mcp: McpSection,
}

impl EngineConfig {
    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load from a file, apply environment overrides, and validate.
    ///
    /// With no explicit path, `TANGENT_CONFIG` is consulted, then
    /// `tangent.toml` in the working directory. A missing default file means
    /// defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok();
        let (path, explicit) = match (path, env_path.as_deref()) {
            (Some(p), _) => (p.to_path_buf(), true),
            (None, Some(p)) => (Path::new(p).to_path_buf(), true),
            (None, None) => (Path::new(DEFAULT_CONFIG_FILE).to_path_buf(), false),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                Self::from_toml(&text)?
            }
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::ReadFile {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of file values.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_string("TANGENT_PROVIDER") {
            self.provider.id = v;
        }
        if let Some(v) = env_string("TANGENT_MODEL") {
            self.provider.model = Some(v);
        }
        if let Some(v) = env_parse::<u32>("AGENT_MAX_STEPS") {
            self.agent.max_steps = v;
        }
        if let Some(v) = env_parse::<usize>("TANGENT_EXCHANGE_LIMIT") {
            self.agent.exchange_limit = v;
        }
        if let Some(v) = env_bool("TANGENT_TOOLS_ENABLED") {
            self.tools.enabled = v;
        }
        if let Some(v) = env_string("TANGENT_TOOL_PROFILE") {
            self.tools.profile = v;
        }
        if let Some(v) = env_bool("ALLOW_PRIVATE_TOOL_NETWORK") {
            self.tools.allow_private_network = v;
        }
        if let Some(v) = env_bool("TANGENT_GUARDRAILS") {
            self.guardrails.enabled = v;
        }
        if let Some(v) = env_string("GUARD_MODE") {
            self.guardrails.mode = v;
        }
        if let Some(v) = env_string("GUARD_ENDPOINT") {
            self.guardrails.endpoint = Some(v);
        }
        if let Some(v) = env_string("GUARD_CONVERSATION_ID_HEADER") {
            self.guardrails.conversation_header = Some(v);
        }
        if let Some(v) = env_parse::<u64>("GUARD_TIMEOUT_SECS") {
            self.guardrails.timeout_secs = v;
        }
        if let Some(v) = env_string("GUARD_PROXY_BASE_URL") {
            self.guardrails.proxy_base_url = Some(v);
        }
        if let Some(v) = env_string("MCP_SERVER_COMMAND") {
            self.mcp.command = Some(v);
        }
        if let Some(v) = env_parse::<u64>("MCP_TIMEOUT_SECS") {
            self.mcp.timeout_secs = v;
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::invalid("agent.max_steps must be at least 1"));
        }
        if self.agent.max_tokens == 0 {
            return Err(ConfigError::invalid("agent.max_tokens must be at least 1"));
        }
        if self.agent.exchange_limit == 0 {
            return Err(ConfigError::invalid(
                "agent.exchange_limit must be at least 1",
            ));
        }
        if PermissionProfile::parse(&self.tools.profile).is_none() {
            return Err(ConfigError::invalid(format!(
                "unknown tools.profile '{}'",
                self.tools.profile
            )));
        }
        if !matches!(self.tools.mode.as_str(), "all" | "allowlist" | "progressive") {
            return Err(ConfigError::invalid(format!(
                "unknown tools.mode '{}' (expected all, allowlist, or progressive)",
                self.tools.mode
            )));
        }
        if self.tools.mode == "allowlist" && self.tools.allowlist.is_empty() {
            return Err(ConfigError::invalid(
                "tools.mode = \"allowlist\" requires a non-empty tools.allowlist",
            ));
        }
        if self.tools.max_tools == 0 {
            return Err(ConfigError::invalid("tools.max_tools must be at least 1"));
        }
        if let Some((name, _)) = self.tools.caps.iter().find(|(_, bytes)| **bytes == 0) {
            return Err(ConfigError::invalid(format!(
                "tools.caps.{} must be at least 1 byte",
                name
            )));
        }
        if !matches!(self.guardrails.mode.as_str(), "direct" | "proxy") {
            return Err(ConfigError::invalid(format!(
                "unknown guardrails.mode '{}' (expected direct or proxy)",
                self.guardrails.mode
            )));
        }
        if self.guardrails.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "guardrails.timeout_secs must be at least 1",
            ));
        }
        if !matches!(self.mcp.refresh.as_str(), "startup" | "per_exchange") {
            return Err(ConfigError::invalid(format!(
                "unknown mcp.refresh '{}' (expected startup or per_exchange)",
                self.mcp.refresh
            )));
        }
        Ok(())
    }

    /// The validated permission profile.
    pub fn permission_profile(&self) -> PermissionProfile {
        PermissionProfile::parse(&self.tools.profile).unwrap_or_default()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.parse().ok()
}

fn env_bool(key: &str) -> Option<bool> {
    match env_string(key)?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config.provider.id, "anthropic");
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.tools.mode, "all");
        assert_eq!(config.tools.max_tools, 20);
        assert!(!config.guardrails.enabled);
        assert_eq!(config.mcp.refresh, "startup");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = EngineConfig::from_toml(
            r#"
            [provider]
            id = "ollama"
            model = "llama3.1"

            [agent]
            max_steps = 5

            [tools]
            profile = "local_only"
            caps = { web_fetch = 100000 }
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.id, "ollama");
        assert_eq!(config.provider.model.as_deref(), Some("llama3.1"));
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.permission_profile(), PermissionProfile::LocalOnly);
        assert_eq!(config.tools.caps["web_fetch"], 100000);
        // Untouched sections keep their defaults.
        assert_eq!(config.agent.max_tokens, 4096);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_steps() {
        let config = EngineConfig::from_toml("[agent]\nmax_steps = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn test_validate_rejects_unknown_profile() {
        let config = EngineConfig::from_toml("[tools]\nprofile = \"yolo\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("profile"));
    }

    #[test]
    fn test_validate_rejects_empty_allowlist_mode() {
        let config = EngineConfig::from_toml("[tools]\nmode = \"allowlist\"").unwrap();
        assert!(config.validate().is_err());

        let config =
            EngineConfig::from_toml("[tools]\nmode = \"allowlist\"\nallowlist = [\"calculator\"]")
                .unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_guard_mode() {
        let config = EngineConfig::from_toml("[guardrails]\nmode = \"sideways\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let config_text = "[provider]\nid = \"anthropic\"\n[agent]\nmax_steps = 2";
        unsafe {
            std::env::set_var("TANGENT_PROVIDER", "ollama");
            std::env::set_var("AGENT_MAX_STEPS", "7");
        }

        let mut config = EngineConfig::from_toml(config_text).unwrap();
        config.apply_env();

        unsafe {
            std::env::remove_var("TANGENT_PROVIDER");
            std::env::remove_var("AGENT_MAX_STEPS");
        }

        assert_eq!(config.provider.id, "ollama");
        assert_eq!(config.agent.max_steps, 7);
    }

    #[test]
    #[serial]
    fn test_load_missing_default_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");
        // An explicit path that does not exist is an error.
        assert!(matches!(
            EngineConfig::load(Some(&path)),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tangent.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[agent]\nmax_steps = 4").unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.agent.max_steps, 4);
    }

    #[test]
    fn test_env_bool_values() {
        unsafe {
            std::env::set_var("TANGENT_TEST_BOOL", "on");
        }
        assert_eq!(env_bool("TANGENT_TEST_BOOL"), Some(true));
        unsafe {
            std::env::set_var("TANGENT_TEST_BOOL", "0");
        }
        assert_eq!(env_bool("TANGENT_TEST_BOOL"), Some(false));
        unsafe {
            std::env::remove_var("TANGENT_TEST_BOOL");
        }
        assert_eq!(env_bool("TANGENT_TEST_BOOL"), None);
    }
}
