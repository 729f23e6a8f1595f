//! Pending Message Registry
//!
//! Holds every locally composed message that has not been confirmed yet,
//! keyed by its synthetic [`LocalId`]. Failed sends stay here as well until
//! they are retried or discarded, so the registry is the single owner of all
//! non-confirmed messages.
//!
//! Entries are indexed by a content fingerprint (sender, receiver and the
//! text or attachment URL) so that confirmation lookups only scan messages
//! that could possibly match.

use core::fmt;
use core::time::Duration;

use hashbrown::HashMap;
use sha2::{Digest, Sha256};

use crate::errors::StateTransitionError;
use crate::message::{DeliveryState, LocalId, Message, SendFailure};
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Content Fingerprint
// ----------------------------------------------------------------------------

/// Hash of the fields a confirmation must share with its pending message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of a message
    ///
    /// Text content is compared when present; otherwise the attachment URL.
    pub fn of(message: &Message) -> Self {
        let mut hasher = Sha256::new();

        hasher.update(message.sender_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(message.receiver_id.as_bytes());
        hasher.update([0u8]);

        match (message.text(), message.attachment_url()) {
            (Some(text), _) => {
                hasher.update(b"t");
                hasher.update(text.as_bytes());
            }
            (None, Some(url)) => {
                hasher.update(b"a");
                hasher.update(url.as_bytes());
            }
            (None, None) => hasher.update(b"-"),
        }

        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines
        f.write_str(&self.to_hex()[..12])
    }
}

// ----------------------------------------------------------------------------
// Registry Entry
// ----------------------------------------------------------------------------

/// A non-confirmed message together with its bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub local_id: LocalId,
    pub message: Message,
    /// Insertion order within the conversation, used to break timestamp ties
    pub seq: u64,
    /// Set once the send collaborator reports an error
    pub failure: Option<SendFailure>,
    fingerprint: Fingerprint,
}

impl PendingEntry {
    pub fn state(&self) -> DeliveryState {
        self.message.delivery_state
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

/// Registry of pending and failed messages for one conversation
#[derive(Debug, Default, Clone)]
pub struct PendingRegistry {
    entries: HashMap<LocalId, PendingEntry>,
    by_fingerprint: HashMap<Fingerprint, Vec<LocalId>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, local_id: &LocalId) -> bool {
        self.entries.contains_key(local_id)
    }

    pub fn get(&self, local_id: &LocalId) -> Option<&PendingEntry> {
        self.entries.get(local_id)
    }

    /// Register a message; returns `None` when the message carries no local id
    pub fn insert(&mut self, message: Message, seq: u64) -> Option<LocalId> {
        let local_id = message.local_id()?;
        let fingerprint = Fingerprint::of(&message);

        let entry = PendingEntry {
            local_id,
            message,
            seq,
            failure: None,
            fingerprint,
        };
        if let Some(previous) = self.entries.insert(local_id, entry) {
            self.unindex(local_id, previous.fingerprint);
        }
        self.by_fingerprint
            .entry(fingerprint)
            .or_default()
            .push(local_id);

        Some(local_id)
    }

    /// Remove an entry regardless of its state
    pub fn remove(&mut self, local_id: &LocalId) -> Option<PendingEntry> {
        let entry = self.entries.remove(local_id)?;
        self.unindex(*local_id, entry.fingerprint);
        Some(entry)
    }

    /// Pending → Failed, recording the failure reason
    pub fn mark_failed(
        &mut self,
        local_id: LocalId,
        failure: SendFailure,
    ) -> Result<&PendingEntry, StateTransitionError> {
        let entry = self
            .entries
            .get_mut(&local_id)
            .ok_or(StateTransitionError::UnknownLocalId { local_id })?;

        if entry.message.delivery_state != DeliveryState::Pending {
            return Err(StateTransitionError::InvalidTransition {
                local_id,
                state: entry.message.delivery_state,
                action: "mark failed",
            });
        }

        entry.message.delivery_state = DeliveryState::Failed;
        entry.failure = Some(failure);
        Ok(entry)
    }

    /// Entries that could be confirmed by a message with this fingerprint
    ///
    /// Only entries still in flight are returned; failed sends wait for an
    /// explicit retry instead of being resurrected by a late confirmation.
    pub fn in_flight_with(&self, fingerprint: &Fingerprint) -> impl Iterator<Item = &PendingEntry> {
        self.by_fingerprint
            .get(fingerprint)
            .into_iter()
            .flatten()
            .filter_map(|local_id| self.entries.get(local_id))
            .filter(|entry| entry.message.delivery_state == DeliveryState::Pending)
    }

    /// All entries in insertion order
    pub fn entries(&self) -> Vec<&PendingEntry> {
        let mut entries: Vec<&PendingEntry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    /// Pending entries created more than `max_age` before `now`, oldest first
    pub fn stale(&self, now: Timestamp, max_age: Duration) -> Vec<LocalId> {
        let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        let mut stale: Vec<&PendingEntry> = self
            .entries
            .values()
            .filter(|entry| entry.message.delivery_state == DeliveryState::Pending)
            .filter(|entry| now - entry.message.created_at > max_age_ms)
            .collect();
        stale.sort_by_key(|entry| (entry.message.created_at, entry.seq));
        stale.into_iter().map(|entry| entry.local_id).collect()
    }

    pub fn count_in(&self, state: DeliveryState) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.message.delivery_state == state)
            .count()
    }

    fn unindex(&mut self, local_id: LocalId, fingerprint: Fingerprint) {
        if let Some(ids) = self.by_fingerprint.get_mut(&fingerprint) {
            ids.retain(|id| *id != local_id);
            if ids.is_empty() {
                self.by_fingerprint.remove(&fingerprint);
            }
        }
    }
}
