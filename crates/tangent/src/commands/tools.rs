//! Tools command - print the merged tool catalog.

use anyhow::Result;
use clap::Args;
use tangent_config::EngineConfig;

use super::build_catalog;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, config: EngineConfig) -> Result<()> {
    let catalog = build_catalog(&config);
    catalog.ensure_discovered().await;
    let defs = catalog.definitions();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&defs)?);
        return Ok(());
    }

    let name_width = defs.iter().map(|d| d.name.len()).max().unwrap_or(0);
    let id_width = defs.iter().map(|d| d.id.len()).max().unwrap_or(0);
    for def in &defs {
        println!(
            "{:id_width$}  {:name_width$}  {:8}  {}",
            def.id,
            def.name,
            def.source.server_name(),
            def.description.lines().next().unwrap_or_default(),
        );
    }
    println!("\n{} tools ({} profile)", defs.len(), catalog.profile());
    Ok(())
}
