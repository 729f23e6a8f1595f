//! Chatline CLI Configuration Management
//!
//! Configuration is read from a TOML file when one is given on the command
//! line; every section and field falls back to its default when absent.
//!
//! ```toml
//! [identity]
//! local_user = "alice"
//!
//! [chatline.reconcile]
//! match_tolerance_ms = 60000
//!
//! [chatline.timeline]
//! utc_offset_secs = 3600
//! ```

use std::path::Path;

use anyhow::Context;
use chatline_core::ChatlineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the chatline CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    /// Engine configuration passed to the runtime unchanged
    pub chatline: ChatlineConfig,
    pub display: DisplayConfig,
}

/// Who the CLI acts as
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Local user id; `--as` takes precedence
    pub local_user: Option<String>,
}

/// Text rendering options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// chrono format string for message times
    pub time_format: String,
    /// Mark pending and failed messages
    pub show_delivery_state: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: "%H:%M".to_string(),
            show_delivery_state: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.chatline.validate().map_err(CliError::Config)?;

        if let Some(user) = &self.identity.local_user {
            if user.trim().is_empty() {
                return Err(CliError::Config("Local user cannot be blank".to_string()));
            }
        }
        if self.display.time_format.is_empty() {
            return Err(CliError::Config("Time format cannot be empty".to_string()));
        }

        Ok(())
    }
}
