//! Tangent - agentic LLM orchestration engine.
//!
//! Main entry point for the Tangent CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{chat, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tangent - agentic LLM orchestration engine
#[derive(Parser)]
#[command(name = "tangent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: tangent.toml)
    #[arg(long, global = true, env = "TANGENT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one exchange against the configured provider
    Chat(chat::ChatArgs),

    /// Print the merged tool catalog
    Tools(tools::ToolsArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tangent=debug,tangent_agent=debug,tangent_llm=debug,tangent_mcp=debug,tangent_guard=debug,info"
    } else {
        "tangent=info,tangent_agent=info,tangent_llm=info,tangent_mcp=warn,tangent_guard=info,warn"
    };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = tangent_config::EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat(args) => chat::run(args, config).await,
        Commands::Tools(args) => tools::run(args, config).await,
    }
}
