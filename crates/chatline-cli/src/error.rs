//! Error handling for the chatline CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Chatline error: {0}")]
    Chatline(#[from] chatline_core::ChatlineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Replay error at line {line}: {reason}")]
    Replay { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    pub fn replay(line: usize, reason: impl ToString) -> Self {
        CliError::Replay {
            line,
            reason: reason.to_string(),
        }
    }
}

/// Context-wrapped failures keep their whole cause chain
impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Config(format!("{err:#}"))
    }
}
