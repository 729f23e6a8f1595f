//! Identity reconciliation
//!
//! Decides what an incoming normalized message means for the visible set:
//! a redelivery of something already confirmed, the confirmation of a
//! message still pending on this device, or a genuinely new message.
//!
//! Matching order:
//! 1. an id that is already confirmed (or already registered) is a duplicate
//! 2. an echoed client reference joins exactly on the pending entry
//! 3. otherwise the oldest in-flight entry with the same direction, the same
//!    text (or attachment URL) and a `created_at` within the tolerance window
//!    is replaced
//! 4. anything else is appended

use hashbrown::HashSet;
use tracing::{debug, warn};

use crate::config::ReconcileConfig;
use crate::conversation::Conversation;
use crate::message::{DeliveryState, LocalId, Message, MessageId};
use crate::normalizer::Normalized;
use crate::pending::{Fingerprint, PendingEntry, PendingRegistry};

// ----------------------------------------------------------------------------
// Confirmed Id Lookup
// ----------------------------------------------------------------------------

/// Lookup over ids that are already confirmed
pub trait ConfirmedIds {
    fn contains_id(&self, id: &MessageId) -> bool;
}

impl ConfirmedIds for Conversation {
    fn contains_id(&self, id: &MessageId) -> bool {
        self.contains(id)
    }
}

impl ConfirmedIds for HashSet<MessageId> {
    fn contains_id(&self, id: &MessageId) -> bool {
        self.contains(id)
    }
}

// ----------------------------------------------------------------------------
// Outcome
// ----------------------------------------------------------------------------

/// What to do with an incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Already visible; drop it
    Duplicate { id: MessageId },
    /// Confirms the pending entry `local_id`
    Replace { local_id: LocalId, message: Message },
    /// New message
    Append { message: Message },
}

impl Reconciliation {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Reconciliation::Duplicate { .. })
    }
}

// ----------------------------------------------------------------------------
// Reconciler
// ----------------------------------------------------------------------------

/// Matches confirmations to pending messages
#[derive(Debug, Clone, Default)]
pub struct IdentityReconciler {
    config: ReconcileConfig,
}

impl IdentityReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn reconcile(
        &self,
        pending: &PendingRegistry,
        confirmed: &impl ConfirmedIds,
        incoming: Normalized,
    ) -> Reconciliation {
        let Normalized {
            message,
            client_ref,
            source,
        } = incoming;

        if confirmed.contains_id(&message.id)
            || message.local_id().is_some_and(|id| pending.contains(&id))
        {
            debug!(id = %message.id, %source, "duplicate delivery");
            return Reconciliation::Duplicate { id: message.id };
        }

        // Drafts and re-ingested failures are never confirmations
        if message.delivery_state != DeliveryState::Delivered {
            return Reconciliation::Append { message };
        }

        if self.config.honor_client_ref {
            if let Some(entry) = client_ref.and_then(|id| pending.get(&id)) {
                let local_id = entry.local_id;
                // A failed send stays failed; its late confirmation is a new message
                if entry.state() != DeliveryState::Pending {
                    debug!(%local_id, id = %message.id, "confirmation for failed send appended");
                    return Reconciliation::Append { message };
                }
                debug!(%local_id, id = %message.id, "confirmed by client reference");
                return Reconciliation::Replace { local_id, message };
            }
        }

        match self.heuristic_match(pending, &message) {
            Some(local_id) => {
                debug!(%local_id, id = %message.id, %source, "confirmed by content match");
                Reconciliation::Replace { local_id, message }
            }
            None => Reconciliation::Append { message },
        }
    }

    /// Oldest in-flight entry sharing direction and content within the window
    fn heuristic_match(&self, pending: &PendingRegistry, message: &Message) -> Option<LocalId> {
        let fingerprint = Fingerprint::of(message);
        let mut candidates: Vec<&PendingEntry> = pending
            .in_flight_with(&fingerprint)
            .filter(|entry| self.same_act(&entry.message, message))
            .collect();

        candidates.sort_by_key(|entry| (entry.message.created_at, entry.seq));

        if candidates.len() > 1 {
            warn!(
                id = %message.id,
                %fingerprint,
                candidates = candidates.len(),
                chosen = %candidates[0].local_id,
                "ambiguous reconciliation, replacing oldest pending message"
            );
        }

        candidates.first().map(|entry| entry.local_id)
    }

    fn same_act(&self, pending: &Message, incoming: &Message) -> bool {
        // Fingerprints can collide in theory; compare the fields themselves
        let same_content = match (pending.text(), incoming.text()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => pending.attachment_url() == incoming.attachment_url(),
            _ => false,
        };

        pending.sender_id == incoming.sender_id
            && pending.receiver_id == incoming.receiver_id
            && same_content
            && pending.created_at.abs_diff(incoming.created_at) <= self.config.match_tolerance_ms
    }
}
