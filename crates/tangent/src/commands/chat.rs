//! Chat command - run one exchange against the configured provider.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tangent_agent::{Agent, AgentConfig, ExchangeLimiter};
use tangent_config::{EngineConfig, ToolsSection};
use tangent_guard::{GuardConfig, GuardGate, GuardMode};
use tangent_llm::{InclusionMode, ProxyRouting, ToolInclusion};
use tangent_types::TraceRecorder;

use super::{build_backend, build_catalog};

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The message to send
    #[arg(required = true)]
    pub message: String,

    /// Provider id (anthropic, openai, ollama)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,

    /// Send no tools with the request
    #[arg(long)]
    pub no_tools: bool,

    /// Enable guardrail checks
    #[arg(long)]
    pub guardrails: bool,

    /// Step budget override
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Dump the trace event log as JSON to stderr
    #[arg(long)]
    pub trace: bool,
}

/// Run the chat command.
pub async fn run(args: ChatArgs, mut config: EngineConfig) -> Result<()> {
    if let Some(steps) = args.max_steps {
        config.agent.max_steps = steps.max(1);
    }
    if args.no_tools {
        config.tools.enabled = false;
    }
    if args.guardrails {
        config.guardrails.enabled = true;
    }

    let guard = if config.guardrails.enabled {
        Some(Arc::new(GuardGate::new(guard_config(&config)?)?))
    } else {
        None
    };
    let proxy = guard
        .as_ref()
        .and_then(|g| g.config().proxy_upstream())
        .map(|(base_url, header_name, credential)| ProxyRouting {
            base_url,
            header_name,
            credential,
        });

    let (backend, provider) = build_backend(&config, args.provider.as_deref(), proxy.as_ref())?;
    let model = args
        .model
        .or_else(|| config.provider.model.clone())
        .unwrap_or_else(|| provider.default_model().to_string());

    let catalog = Arc::new(build_catalog(&config));
    if config.mcp.refresh == "per_exchange" {
        catalog.refresh().await;
    }
    let agent_config = AgentConfig::new(model)
        .with_max_steps(config.agent.max_steps)
        .with_tools(inclusion_from(&config.tools));
    let mut agent = Agent::new(backend, catalog, agent_config)
        .with_limiter(ExchangeLimiter::new(config.agent.exchange_limit));
    if let Some(guard) = guard {
        agent = agent.with_guard(guard);
    }

    let trace = TraceRecorder::new();
    let result = agent.run(&args.message, &trace).await;

    if args.trace {
        eprintln!("{}", serde_json::to_string_pretty(&trace.events())?);
    }

    let outcome = result?;
    println!("{}", outcome.text);

    tracing::info!(
        steps = outcome.steps,
        tool_calls = outcome.tool_calls,
        tokens = outcome.usage.total(),
        blocked = outcome.blocked,
        "exchange complete"
    );
    Ok(())
}

/// The tool inclusion policy as config describes it.
fn inclusion_from(tools: &ToolsSection) -> ToolInclusion {
    if !tools.enabled {
        return ToolInclusion::disabled();
    }
    let mode = match tools.mode.as_str() {
        "allowlist" => InclusionMode::Allowlist(tools.allowlist.iter().cloned().collect()),
        "progressive" => InclusionMode::Progressive(tools.max_tools),
        _ => InclusionMode::All,
    };
    ToolInclusion {
        enabled: true,
        mode,
        max_tools: tools.max_tools,
    }
}

/// Gate configuration from the config file sections. The credential itself is
/// env-only.
fn guard_config(config: &EngineConfig) -> Result<GuardConfig> {
    let section = &config.guardrails;
    let mut gc = GuardConfig {
        mode: GuardMode::parse(&section.mode)?,
        timeout: std::time::Duration::from_secs(section.timeout_secs),
        conversation_header: section.conversation_header.clone(),
        proxy_base_url: section.proxy_base_url.clone(),
        api_key: std::env::var("GUARD_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty()),
        ..GuardConfig::default()
    };
    if let Some(endpoint) = &section.endpoint {
        gc.endpoint = endpoint.clone();
    }
    Ok(gc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusion_disabled() {
        let section = ToolsSection {
            enabled: false,
            ..ToolsSection::default()
        };
        assert!(!inclusion_from(&section).enabled);
    }

    #[test]
    fn test_inclusion_allowlist() {
        let section = ToolsSection {
            mode: "allowlist".to_string(),
            allowlist: vec!["calculator".to_string()],
            ..ToolsSection::default()
        };
        let inclusion = inclusion_from(&section);
        assert!(matches!(inclusion.mode, InclusionMode::Allowlist(ref names) if names.contains("calculator")));
    }

    #[test]
    fn test_guard_config_from_sections() {
        let mut config = EngineConfig::default();
        config.guardrails.mode = "proxy".to_string();
        config.guardrails.proxy_base_url = Some("https://proxy.example.com".to_string());
        config.guardrails.timeout_secs = 5;

        let gc = guard_config(&config).unwrap();
        assert_eq!(gc.mode, GuardMode::Proxy);
        assert_eq!(gc.timeout.as_secs(), 5);
        assert_eq!(gc.proxy_base_url.as_deref(), Some("https://proxy.example.com"));
    }
}
