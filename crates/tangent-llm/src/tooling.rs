//! Tool inclusion and provider-facing naming.
//!
//! The registry's canonical tool names (`local-tools.echo`,
//! `builtin:calculator`) are not always legal provider tool names, and a
//! request should not necessarily carry the whole catalog. This module
//! selects which tools ride along on a request and builds the reversible
//! mapping between canonical tool ids and sanitised provider-facing names.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use tangent_types::ToolDef;

use crate::error::{LlmError, Result};
use crate::types::ToolDefinition;

/// Longest provider-facing tool name accepted across backends.
const MAX_TOOL_NAME_LEN: usize = 64;

/// Default cap on tools included in a single request.
pub const DEFAULT_MAX_TOOLS: usize = 20;

// ─────────────────────────────────────────────────────────────────────────────
// Inclusion Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Which tools from the catalog are offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum InclusionMode {
    /// Offer the whole catalog (subject to the cap).
    All,
    /// Offer only tools whose canonical or raw name is listed.
    Allowlist(BTreeSet<String>),
    /// Offer the first `n` tools in deterministic name order.
    Progressive(usize),
}

/// Tool inclusion policy for provider requests.
#[derive(Debug, Clone)]
pub struct ToolInclusion {
    /// Whether tools are sent at all.
    pub enabled: bool,
    /// Selection mode.
    pub mode: InclusionMode,
    /// Hard cap applied after selection.
    pub max_tools: usize,
}

impl Default for ToolInclusion {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: InclusionMode::All,
            max_tools: DEFAULT_MAX_TOOLS,
        }
    }
}

impl ToolInclusion {
    /// An inclusion policy that sends no tools.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Select the tools to offer, in deterministic name order.
    pub fn select<'a>(&self, tools: &'a [ToolDef]) -> Vec<&'a ToolDef> {
        if !self.enabled {
            return Vec::new();
        }

        let mut selected: Vec<&ToolDef> = match &self.mode {
            InclusionMode::All => tools.iter().collect(),
            InclusionMode::Allowlist(names) => tools
                .iter()
                .filter(|t| names.contains(&t.name) || names.contains(t.raw_name()))
                .collect(),
            InclusionMode::Progressive(_) => tools.iter().collect(),
        };

        selected.sort_by(|a, b| a.name.cmp(&b.name));

        if let InclusionMode::Progressive(n) = &self.mode {
            selected.truncate(*n);
        }
        selected.truncate(self.max_tools);
        selected
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider Tool Map
// ─────────────────────────────────────────────────────────────────────────────

/// The provider-facing tool set plus the reverse name mapping.
///
/// Names the model sees are sanitised and deduplicated; when the model later
/// requests a tool by that name, [`ProviderToolMap::resolve`] translates it
/// back to the canonical tool id. An unknown name is a protocol error.
#[derive(Debug, Clone, Default)]
pub struct ProviderToolMap {
    definitions: Vec<ToolDefinition>,
    by_provider_name: BTreeMap<String, String>,
}

impl ProviderToolMap {
    /// Build the provider tool set from the selected catalog entries.
    pub fn build(tools: &[&ToolDef]) -> Self {
        let mut map = Self::default();
        let mut taken: BTreeSet<String> = BTreeSet::new();

        for tool in tools {
            let provider_name = provider_name_for(tool, &taken);
            taken.insert(provider_name.clone());
            map.by_provider_name
                .insert(provider_name.clone(), tool.id.clone());
            map.definitions.push(ToolDefinition::new(
                provider_name,
                tool.description.clone(),
                tool.input_schema.clone(),
            ));
        }

        map
    }

    /// The definitions to put on the request.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Number of tools offered.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// True when no tools are offered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Translate a provider-facing name back to the canonical tool id.
    pub fn resolve(&self, provider_name: &str) -> Result<&str> {
        self.by_provider_name
            .get(provider_name)
            .map(String::as_str)
            .ok_or_else(|| {
                LlmError::protocol(format!(
                    "model requested unknown tool '{}'",
                    provider_name
                ))
            })
    }
}

/// Pick a provider-facing name for a tool: its sanitised short name when
/// free, then a server-prefixed form, then a digest suffix as the last resort.
fn provider_name_for(tool: &ToolDef, taken: &BTreeSet<String>) -> String {
    let short = sanitize_tool_name(tool.raw_name());
    if !taken.contains(&short) {
        return short;
    }

    if tool.source.is_mcp() {
        let prefixed = sanitize_tool_name(&format!(
            "{}_{}",
            tool.source.server_name(),
            tool.raw_name()
        ));
        if !taken.contains(&prefixed) {
            return prefixed;
        }
    }

    let digest = Sha256::digest(tool.id.as_bytes());
    let suffix = hex::encode(&digest[..4]);
    let mut base = short;
    base.truncate(MAX_TOOL_NAME_LEN - suffix.len() - 1);
    format!("{}_{}", base, suffix)
}

/// Sanitise a name to `[A-Za-z0-9_-]`, at most 64 chars, never empty.
pub fn sanitize_tool_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    out.truncate(MAX_TOOL_NAME_LEN);
    if out.is_empty() {
        out.push_str("tool");
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
