//! Provider selection and backend construction.

use std::sync::Arc;

use crate::anthropic::{AnthropicBackend, AnthropicConfig};
use crate::backend::SharedBackend;
use crate::error::{LlmError, Result};
use crate::ollama::{OllamaBackend, OllamaConfig};
use crate::openai::{OpenAiBackend, OpenAiConfig};

/// Default credential header name for proxy deployments.
pub const DEFAULT_PROXY_HEADER: &str = "X-ApiKey";

/// A supported provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderId {
    Anthropic,
    OpenAi,
    Ollama,
}

impl ProviderId {
    /// Parse a provider id from its configuration string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "gpt" => Ok(Self::OpenAi),
            "ollama" | "local" => Ok(Self::Ollama),
            other => Err(LlmError::config(format!("unknown provider '{}'", other))),
        }
    }

    /// The canonical id string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    /// The default model for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o-mini",
            Self::Ollama => "llama3.1",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing overrides for proxy deployments: all provider traffic goes to the
/// proxy base URL, authenticated with an extra credential header.
#[derive(Debug, Clone)]
pub struct ProxyRouting {
    /// Proxy base URL (replaces the provider's own).
    pub base_url: String,
    /// Credential header name.
    pub header_name: String,
    /// Credential value.
    pub credential: String,
}

impl ProxyRouting {
    /// Create proxy routing with the default credential header name.
    pub fn new(base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            header_name: DEFAULT_PROXY_HEADER.to_string(),
            credential: credential.into(),
        }
    }
}

/// Providers that are usable with the current environment.
///
/// Anthropic and OpenAI need their API keys; Ollama is always listed since
/// it requires none.
pub fn available_providers() -> Vec<ProviderId> {
    let mut out = Vec::new();
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        out.push(ProviderId::Anthropic);
    }
    if std::env::var("OPENAI_API_KEY").is_ok() {
        out.push(ProviderId::OpenAi);
    }
    out.push(ProviderId::Ollama);
    out
}

/// Construct a backend for the given provider.
///
/// `base_url` overrides the provider's own endpoint. With `proxy` set, the
/// proxy base URL wins and the backend carries the proxy credential header in
/// addition to its normal authentication.
pub fn create_backend(
    provider: ProviderId,
    base_url: Option<&str>,
    proxy: Option<&ProxyRouting>,
) -> Result<SharedBackend> {
    let backend: SharedBackend = match provider {
        ProviderId::Anthropic => {
            let mut config = AnthropicConfig::from_env()?;
            if let Some(url) = base_url {
                config = config.with_base_url(url);
            }
            if let Some(p) = proxy {
                config = config
                    .with_base_url(p.base_url.clone())
                    .with_extra_header(p.header_name.clone(), p.credential.clone());
            }
            Arc::new(AnthropicBackend::new(config)?)
        }
        ProviderId::OpenAi => {
            let mut config = OpenAiConfig::from_env()?;
            if let Some(url) = base_url {
                config = config.with_base_url(url);
            }
            if let Some(p) = proxy {
                config = config
                    .with_base_url(p.base_url.clone())
                    .with_extra_header(p.header_name.clone(), p.credential.clone());
            }
            Arc::new(OpenAiBackend::new(config)?)
        }
        ProviderId::Ollama => {
            let mut config = OllamaConfig::from_env();
            if let Some(url) = base_url {
                config = config.with_base_url(url);
            }
            if let Some(p) = proxy {
                config = config.with_base_url(p.base_url.clone());
            }
            Arc::new(OllamaBackend::new(config)?)
        }
    };

    tracing::debug!(provider = %provider, "Created provider backend");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_ids() {
        assert_eq!(ProviderId::parse("anthropic").unwrap(), ProviderId::Anthropic);
        assert_eq!(ProviderId::parse("OpenAI").unwrap(), ProviderId::OpenAi);
        assert_eq!(ProviderId::parse(" ollama ").unwrap(), ProviderId::Ollama);
        assert!(matches!(
            ProviderId::parse("mystery"),
            Err(LlmError::Config(_))
        ));
    }

    #[test]
    fn test_default_models() {
        assert!(ProviderId::Anthropic.default_model().starts_with("claude"));
        assert!(ProviderId::Ollama.default_model().starts_with("llama"));
    }

    #[test]
    fn test_proxy_routing_default_header() {
        let proxy = ProxyRouting::new("https://proxy.example.com", "cred");
        assert_eq!(proxy.header_name, DEFAULT_PROXY_HEADER);
    }
}
