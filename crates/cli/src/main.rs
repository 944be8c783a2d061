//! Infra-Lab CLI
//!
//! A command-line tool for rendering Infrastructure Agent ProcessSample
//! configurations, estimating their ingest cost, linting them for risk, and
//! rolling them out to host fleets.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{estimate, lint, presets, render, rollout, validate};

/// Infra-Lab: ProcessSample ingest tuning toolkit
#[derive(Parser)]
#[command(name = "ilab")]
#[command(author, version, about = "Infra-Lab ProcessSample tuning toolkit", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect configuration presets
    #[command(subcommand)]
    Presets(presets::PresetsCommands),

    /// Render an agent configuration from a preset
    Render(render::RenderArgs),

    /// Estimate the ingest cost of a configuration
    EstimateCost(estimate::EstimateArgs),

    /// Lint a configuration and report its risk score
    Lint(lint::LintArgs),

    /// Roll a configuration out to a host batch
    Rollout(rollout::RolloutArgs),

    /// Validate observed ingest against the promised estimate
    Validate(validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Presets(cmd) => presets::run(cmd, cli.format),
        Commands::Render(args) => render::run(args, cli.format),
        Commands::EstimateCost(args) => estimate::run(args, cli.format).await,
        Commands::Lint(args) => lint::run(args, cli.format),
        Commands::Rollout(args) => rollout::run(args, cli.format).await,
        Commands::Validate(args) => validate::run(args, cli.format).await,
    }
}
