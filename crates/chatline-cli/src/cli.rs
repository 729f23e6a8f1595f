//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines event log and print the resulting timelines
    Replay {
        /// Event log, one JSON object per line
        file: PathBuf,
        /// Local user the log was recorded for (overrides the configuration)
        #[arg(short = 'u', long = "as")]
        local_user: Option<String>,
        /// Counterpart for drafts that do not name a receiver
        #[arg(short, long)]
        with: Option<String>,
        /// Viewer offset from UTC in hours (overrides the configuration)
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<i32>,
        /// Print snapshots as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}
