//! Chatline CLI library
//!
//! Replays recorded conversation event logs through the chatline runtime and
//! renders the resulting timelines.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod render;
pub mod replay;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use replay::{replay_file, ReplayClock, ReplayEvent, ReplayReport, ReplaySummary, Replayer};
