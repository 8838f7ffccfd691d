//! Cadence CLI - run configured pipelines over CSV sample files.

mod commands;
mod csv;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(author, version, about = "Cadence streaming DSP engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a configured pipeline over a CSV file, resuming saved state
    Run(commands::run::RunArgs),

    /// Show the state saved under a key
    State(commands::state::StateArgs),

    /// Compute batch spectra of each channel in a CSV file
    Spectrum(commands::spectrum::SpectrumArgs),

    /// List built-in configurations and stage kinds
    Configs(commands::configs::ConfigsArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::State(args) => commands::state::run(args),
        Commands::Spectrum(args) => commands::spectrum::run(args),
        Commands::Configs(args) => commands::configs::run(args),
    }
}
