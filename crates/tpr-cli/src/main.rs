//! tpr - target platform resolver CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tpr_cli::cmd;
use tpr_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            target,
            environments,
            json,
        } => cmd::resolve::resolve(&target, environments, json),
        Commands::Mirror { config } => cmd::mirror::mirror(&config),
    }
}
