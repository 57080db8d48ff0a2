//! Speedcut CLI
//!
//! Command-line interface for the Speedcut audio reconstruction engine.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use speedcut::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .init();

    info!("Speedcut v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Speedcut v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Render {
            job,
            output,
            parallel,
        } => commands::render(&job, output.as_deref(), parallel)
            .with_context(|| format!("Failed to render {}", job.display())),
        Commands::Inspect { job } => {
            commands::inspect(&job).with_context(|| format!("Failed to inspect {}", job.display()))
        }
    }
}
