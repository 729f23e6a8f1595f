//! Test utilities for deterministic conversation tests
//!
//! Provides a controllable clock and payload builders so scenario and
//! property tests read as sequences of events.

#![allow(dead_code)]

use chatline_core::{
    AttachmentDescriptor, ChatlineConfig, ConversationStore, Participants, PushEvent, RawPayload,
    SendAck, TimeSource, Timestamp, UserId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 2024-01-01T09:00:00Z
pub const JAN_1_0900: u64 = 1_704_099_600_000;

// ----------------------------------------------------------------------------
// Mock Time Source
// ----------------------------------------------------------------------------

/// Mock time source for deterministic testing
#[derive(Debug, Clone)]
pub struct MockTimeSource {
    current_time: Arc<AtomicU64>,
}

impl MockTimeSource {
    /// Create a new mock time source starting at time 0
    pub fn new() -> Self {
        Self::new_at(0)
    }

    /// Create a new mock time source starting at a specific time
    pub fn new_at(start_time: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(start_time)),
        }
    }

    /// Advance time by the specified number of milliseconds
    pub fn advance(&self, millis: u64) {
        self.current_time.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the time to a specific value
    pub fn set_time(&self, millis: u64) {
        self.current_time.store(millis, Ordering::SeqCst);
    }
}

impl Default for MockTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current_time.load(Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------------

/// Store for the alice ↔ bob conversation, seen from alice's device, in UTC
pub fn alice_store(clock: &MockTimeSource) -> ConversationStore<MockTimeSource> {
    ConversationStore::new(
        Participants::new("alice", "bob"),
        &ChatlineConfig::testing(),
        clock.clone(),
    )
}

/// Ack for a message alice sent
pub fn ack(id: &str, content: &str, created_at: u64) -> RawPayload {
    RawPayload::Ack(SendAck {
        id: id.to_string(),
        client_ref: None,
        sender_id: Some(UserId::from("alice")),
        receiver_id: Some(UserId::from("bob")),
        content: Some(content.to_string()),
        attachment: None,
        created_at: Some(created_at),
        timestamp: None,
        read: None,
        delivered: Some(true),
    })
}

/// Push of a message between the two participants
pub fn push(id: &str, sender: &str, receiver: &str, content: &str, created_at: u64) -> RawPayload {
    RawPayload::Push(PushEvent {
        id: Some(id.to_string()),
        sender_id: Some(UserId::from(sender)),
        receiver_id: Some(UserId::from(receiver)),
        content: Some(content.to_string()),
        created_at: Some(created_at),
        ..PushEvent::default()
    })
}

/// Push carrying only an attachment
pub fn attachment_push(id: &str, sender: &str, receiver: &str, url: &str, created_at: u64) -> RawPayload {
    RawPayload::Push(PushEvent {
        id: Some(id.to_string()),
        sender_id: Some(UserId::from(sender)),
        receiver_id: Some(UserId::from(receiver)),
        attachment: Some(AttachmentDescriptor::new(url)),
        created_at: Some(created_at),
        ..PushEvent::default()
    })
}
