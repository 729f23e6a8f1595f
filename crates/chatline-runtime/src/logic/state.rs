//! Conversation Task Statistics

/// Counters kept by a conversation task for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub commands_processed: u64,
    pub effects_generated: u64,
    pub app_events_generated: u64,
    pub app_events_dropped: u64,
}
