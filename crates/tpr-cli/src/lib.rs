//! tpr - target platform resolver
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Resolves target definitions against p2-style repositories and mirrors
//! units with their dependencies and artifacts into a destination
//! repository.
//!
//! Repositories are directories addressed by `file:` URLs, each holding a
//! `content.json` (unit metadata) and an `artifacts.json` (artifact
//! descriptors).

pub mod cmd;
pub mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tpr_schema::TargetEnvironment;

#[derive(Debug, Parser)]
#[command(name = "tpr")]
#[command(author, version, about = "tpr - resolve target platforms and mirror repositories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve a target definition and list the selected units
    Resolve {
        /// Target definition (TOML)
        target: PathBuf,
        /// Environment as os/ws/arch[/nl]; overrides the definition's environments
        #[arg(long = "env", value_name = "OS/WS/ARCH")]
        environments: Vec<TargetEnvironment>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mirror units and their artifacts into a destination repository
    Mirror {
        /// Mirror job description (TOML)
        config: PathBuf,
    },
}
