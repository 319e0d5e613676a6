//! Maestro CLI — the main entry point.
//!
//! Commands:
//! - `run`        — Route one request through the orchestrator
//! - `status`     — Show configuration and registry status
//! - `tools`      — List registered tools
//! - `templates`  — List workflow templates
//! - `health`     — Run tool health checks
//! - `doctor`     — Diagnose configuration and environment

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "maestro",
    about = "Maestro — tool-orchestration decision engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.maestro/config.toml)
    #[arg(short, long, global = true, env = "MAESTRO_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a single request through the decision pipeline
    Run(commands::run::RunArgs),

    /// Show configuration and registry status
    Status,

    /// List registered tools
    Tools {
        /// Include tools that are currently unavailable
        #[arg(short, long)]
        all: bool,
    },

    /// List workflow templates
    Templates,

    /// Run every tool's health check
    Health,

    /// Diagnose configuration and environment
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays machine-readable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => commands::run::run(config, args).await?,
        Commands::Status => commands::status::run(config).await?,
        Commands::Tools { all } => commands::tools::run(config, all).await?,
        Commands::Templates => commands::templates::run(config).await?,
        Commands::Health => commands::health::run(config).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
