//! Auto-scroll policy
//!
//! The message list is rendered inverted, so the scroll offset is the
//! distance from the newest message. A new message only moves the viewport
//! when the user sent it or is already reading the bottom of the list.

use serde::{Deserialize, Serialize};

use crate::config::ScrollConfig;
use crate::message::Message;

/// Viewport geometry reported by the rendering layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportMetrics {
    /// Distance from the bottom of the inverted list, in logical pixels
    pub scroll_offset: f32,
    /// Height of the visible area; zero before the first layout pass
    pub viewport_height: f32,
}

impl ViewportMetrics {
    pub fn new(scroll_offset: f32, viewport_height: f32) -> Self {
        Self {
            scroll_offset,
            viewport_height,
        }
    }

    /// Scrolled to the newest message
    pub fn at_bottom(viewport_height: f32) -> Self {
        Self::new(0.0, viewport_height)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollPolicy {
    config: ScrollConfig,
}

impl ScrollPolicy {
    pub fn new(config: ScrollConfig) -> Self {
        Self { config }
    }

    pub fn should_auto_scroll(
        &self,
        message: &Message,
        is_local_sender: bool,
        viewport: ViewportMetrics,
    ) -> bool {
        if is_local_sender || message.is_local_echo {
            return true;
        }

        // Not laid out yet
        if viewport.viewport_height <= 0.0 || viewport.viewport_height.is_nan() {
            return true;
        }

        // Overscroll past the bottom reports a negative offset
        let offset = viewport.scroll_offset.max(0.0);
        offset <= self.config.proximity_threshold_px
    }
}
