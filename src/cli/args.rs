//! CLI argument definitions using clap
//!
//! Commands:
//! - versadoc check --config <path>
//! - versadoc replay --config <path> [--script <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// versadoc - versioned documents over a document store
#[derive(Parser, Debug)]
#[command(name = "versadoc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Minimum log severity written to stderr (trace, info, warn, error, fatal)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a configuration file and print each resource's derived settings
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./versadoc.json")]
        config: PathBuf,
    },

    /// Run JSON-lines operations against an in-memory store
    Replay {
        /// Path to configuration file
        #[arg(long, default_value = "./versadoc.json")]
        config: PathBuf,

        /// Operations file; stdin when absent
        #[arg(long)]
        script: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
