//! PulseFx CLI
//!
//! Command-line front-end for the effect pipeline core.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use pulsefx::cli::{commands, tap_for, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("PulseFx v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("PulseFx v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Chain {
            config,
            layout,
            missing,
            json,
            toggles,
        } => {
            info!("Applying {} toggle(s)", toggles.len());
            commands::chain(config.as_deref(), layout, &missing, &toggles, json)
                .context("failed to build the effects chain")
        }
        Commands::SpectrumAxis {
            rate,
            points,
            bands,
        } => commands::spectrum_axis(rate, points, bands).context("failed to compute the spectrum axis"),
        Commands::Plugins { missing, layout } => {
            commands::plugins(&missing, layout).context("failed to list plugins")
        }
        Commands::Meter {
            segment,
            output,
            peaks,
        } => commands::meter(segment, tap_for(output), &peaks).context("failed to run the meter"),
    }
}
