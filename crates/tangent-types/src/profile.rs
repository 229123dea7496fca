//! Permission profiles restricting which tool categories may be dispatched.

use serde::{Deserialize, Serialize};

/// Named policy applied before tool dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionProfile {
    /// No restriction beyond the private-network rule.
    #[default]
    Standard,
    /// Deny mutating local actions and local egress.
    ReadOnly,
    /// Deny all network-bound tools.
    LocalOnly,
    /// Permit all network tools.
    NetworkOpen,
}

impl PermissionProfile {
    /// Parse a profile name as it appears in config or env.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" | "" => Some(Self::Standard),
            "read_only" | "readonly" => Some(Self::ReadOnly),
            "local_only" | "localonly" => Some(Self::LocalOnly),
            "network_open" | "networkopen" => Some(Self::NetworkOpen),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ReadOnly => "read_only",
            Self::LocalOnly => "local_only",
            Self::NetworkOpen => "network_open",
        }
    }
}

impl std::fmt::Display for PermissionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
