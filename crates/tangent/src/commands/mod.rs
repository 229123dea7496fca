//! CLI command implementations.

pub mod chat;
pub mod tools;

use std::time::Duration;

use anyhow::Result;
use tangent_agent::{ToolCatalog, ToolContext};
use tangent_config::EngineConfig;
use tangent_mcp::{ServerLaunch, split_command};

/// Build the merged tool catalog from config.
///
/// A configured `mcp.command` wins; otherwise [`ServerLaunch::from_env`]
/// attaches the bundled server when it is present. Without either, the
/// catalog serves built-ins only.
pub fn build_catalog(config: &EngineConfig) -> ToolCatalog {
    let ctx = ToolContext::default().with_private_network(config.tools.allow_private_network);
    let profile = config.permission_profile();
    let mut catalog =
        ToolCatalog::new(profile, ctx).with_output_caps(config.tools.caps.clone());

    let launch = match &config.mcp.command {
        Some(raw) => {
            let parts = split_command(raw);
            parts.split_first().map(|(command, args)| {
                ServerLaunch::new("mcp", command)
                    .with_args(args.to_vec())
                    .with_timeout(Duration::from_secs(config.mcp.timeout_secs))
            })
        }
        None => ServerLaunch::from_env(),
    };
    if let Some(launch) = launch {
        catalog = catalog.with_server(launch);
    }
    catalog
}

/// Construct the provider backend described by config and flags.
pub fn build_backend(
    config: &EngineConfig,
    provider_flag: Option<&str>,
    proxy: Option<&tangent_llm::ProxyRouting>,
) -> Result<(tangent_llm::SharedBackend, tangent_llm::ProviderId)> {
    let raw = provider_flag.unwrap_or(&config.provider.id);
    let provider = tangent_llm::ProviderId::parse(raw)?;
    let backend = tangent_llm::create_backend(provider, config.provider.base_url.as_deref(), proxy)?;
    Ok((backend, provider))
}
