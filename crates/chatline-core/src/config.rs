//! Centralized Configuration Management
//!
//! This module consolidates the configuration structures used by the pipeline
//! and the conversation tasks so collaborators tune them in one place.

use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Default window within which a confirmation may match a pending message
pub const DEFAULT_MATCH_TOLERANCE_MS: u64 = 120_000;

/// Default distance from the bottom, in logical pixels, that still counts as "at bottom"
pub const DEFAULT_PROXIMITY_THRESHOLD_PX: f32 = 120.0;

// ----------------------------------------------------------------------------
// Reconciliation Configuration
// ----------------------------------------------------------------------------

/// Configuration for matching pending messages to confirmations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Maximum |created_at| skew between a pending message and its confirmation
    pub match_tolerance_ms: u64,
    /// Join on an echoed client reference before falling back to the heuristic
    pub honor_client_ref: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            match_tolerance_ms: DEFAULT_MATCH_TOLERANCE_MS,
            honor_client_ref: true,
        }
    }
}

impl ReconcileConfig {
    /// Tight window for servers with synchronized clocks
    pub fn strict() -> Self {
        Self {
            match_tolerance_ms: 10_000,
            honor_client_ref: true,
        }
    }

    /// Wide window for devices with unreliable clocks
    pub fn lenient() -> Self {
        Self {
            match_tolerance_ms: 600_000,
            honor_client_ref: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Scroll Configuration
// ----------------------------------------------------------------------------

/// Configuration for viewport auto-scroll decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Offsets at or below this count as "at the bottom of the list"
    pub proximity_threshold_px: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_px: DEFAULT_PROXIMITY_THRESHOLD_PX,
        }
    }
}

// ----------------------------------------------------------------------------
// Timeline Configuration
// ----------------------------------------------------------------------------

/// Configuration for date bucketing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Viewer's offset from UTC in seconds; `None` uses the host's local offset
    pub utc_offset_secs: Option<i32>,
}

impl TimelineConfig {
    pub fn utc() -> Self {
        Self {
            utc_offset_secs: Some(0),
        }
    }

    pub fn with_offset_hours(hours: i32) -> Self {
        Self {
            utc_offset_secs: Some(hours * 3600),
        }
    }

    /// Resolve the configured offset into a chrono zone
    pub fn zone(&self) -> FixedOffset {
        match self.utc_offset_secs {
            Some(secs) => FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix()),
            None => *chrono::Local::now().offset(),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for conversation task channel buffer sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for the per-conversation command queue
    pub command_buffer_size: usize,
    /// Buffer size for AppEvent channels (conversation task → UI)
    pub app_event_buffer_size: usize,
    /// Buffer size for Effect channels (conversation task → send collaborator)
    pub effect_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 64,   // compose and push bursts share this queue
            app_event_buffer_size: 64, // UI updates need responsiveness
            effect_buffer_size: 64,    // sends are dispatched quickly
        }
    }
}

impl ChannelConfig {
    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            command_buffer_size: 16,
            app_event_buffer_size: 16,
            effect_buffer_size: 16,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            app_event_buffer_size: 100,
            effect_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration consolidating all Chatline configurations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatlineConfig {
    /// Channel buffer configuration
    pub channels: ChannelConfig,
    /// Pending/confirmed matching configuration
    pub reconcile: ReconcileConfig,
    /// Auto-scroll configuration
    pub scroll: ScrollConfig,
    /// Date bucketing configuration
    pub timeline: TimelineConfig,
}

/// Shared configuration handle for tasks
pub type SharedChatlineConfig = Arc<ChatlineConfig>;

impl ChatlineConfig {
    /// Create new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration optimized for testing
    ///
    /// Buckets are computed in UTC so date assertions do not depend on the host.
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            reconcile: ReconcileConfig::default(),
            scroll: ScrollConfig::default(),
            timeline: TimelineConfig::utc(),
        }
    }

    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            channels: ChannelConfig::low_memory(),
            ..Self::default()
        }
    }

    /// Builder method for customizing channel configuration
    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    /// Builder method for customizing reconciliation
    pub fn with_reconcile(mut self, reconcile: ReconcileConfig) -> Self {
        self.reconcile = reconcile;
        self
    }

    /// Builder method for customizing scroll behavior
    pub fn with_scroll(mut self, scroll: ScrollConfig) -> Self {
        self.scroll = scroll;
        self
    }

    /// Builder method for customizing date bucketing
    pub fn with_timeline(mut self, timeline: TimelineConfig) -> Self {
        self.timeline = timeline;
        self
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.command_buffer_size == 0 {
            return Err("Command buffer size cannot be zero".into());
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err("App event buffer size cannot be zero".into());
        }
        if self.channels.effect_buffer_size == 0 {
            return Err("Effect buffer size cannot be zero".into());
        }

        if self.reconcile.match_tolerance_ms == 0 {
            return Err("Match tolerance must be positive".into());
        }

        if !self.scroll.proximity_threshold_px.is_finite()
            || self.scroll.proximity_threshold_px < 0.0
        {
            return Err("Proximity threshold must be a non-negative number".into());
        }

        if let Some(secs) = self.timeline.utc_offset_secs {
            if FixedOffset::east_opt(secs).is_none() {
                return Err(format!("UTC offset {secs}s is out of range"));
            }
        }

        Ok(())
    }

    /// Convert into a shared handle
    pub fn into_shared(self) -> SharedChatlineConfig {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ChatlineConfig::default().validate().is_ok());
        assert!(ChatlineConfig::testing().validate().is_ok());
        assert!(ChatlineConfig::low_memory().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = ChatlineConfig::default().with_channels(ChannelConfig {
            command_buffer_size: 0,
            ..ChannelConfig::default()
        });
        assert!(config.validate().is_err());

        let config = ChatlineConfig::default().with_reconcile(ReconcileConfig {
            match_tolerance_ms: 0,
            honor_client_ref: true,
        });
        assert!(config.validate().is_err());

        let config = ChatlineConfig::default().with_scroll(ScrollConfig {
            proximity_threshold_px: f32::NAN,
        });
        assert!(config.validate().is_err());

        let config = ChatlineConfig::default().with_timeline(TimelineConfig {
            utc_offset_secs: Some(200_000),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeline_zone_resolution() {
        assert_eq!(TimelineConfig::utc().zone().local_minus_utc(), 0);
        assert_eq!(
            TimelineConfig::with_offset_hours(-5).zone().local_minus_utc(),
            -5 * 3600
        );
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: ChatlineConfig =
            serde_json::from_str(r#"{"reconcile":{"match_tolerance_ms":5000}}"#).unwrap();
        assert_eq!(config.reconcile.match_tolerance_ms, 5000);
        assert!(config.reconcile.honor_client_ref);
        assert_eq!(config.channels, ChannelConfig::default());
    }
}
