//! Conversation Store
//!
//! Owns one conversation's visible message set and sequences the pipeline:
//! normalize, reconcile, apply, then evaluate the scroll policy. Confirmed
//! messages live in the [`Conversation`]; pending and failed ones in the
//! [`PendingRegistry`]. Each message is held in exactly one of the two, so a
//! placeholder can never be visible next to its confirmed twin.

use core::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ChatlineConfig;
use crate::conversation::Conversation;
use crate::errors::PayloadError;
use crate::message::{DeliveryState, LocalId, Message, MessageId, SendFailure};
use crate::normalizer::{MessageNormalizer, Normalized};
use crate::payload::{Draft, RawPayload};
use crate::pending::{PendingEntry, PendingRegistry};
use crate::reconciler::{IdentityReconciler, Reconciliation};
use crate::scroll::{ScrollPolicy, ViewportMetrics};
use crate::timeline::{DateBucket, TimelineGrouper};
use crate::types::{ConversationId, Participants, TimeSource};
use crate::{ChatlineError, Result};

// ----------------------------------------------------------------------------
// Outcomes and Statistics
// ----------------------------------------------------------------------------

/// How an ingested payload changed the visible set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// New message added
    Appended { id: MessageId },
    /// A pending message was confirmed and replaced
    Replaced { local_id: LocalId, id: MessageId },
    /// Already visible; nothing changed
    Duplicate { id: MessageId },
    /// Belongs to a different conversation
    Foreign,
}

/// Result of [`ConversationStore::ingest_remote`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Whether the visible set changed
    pub accepted: bool,
    /// Whether the viewport should follow the new message
    pub scroll_hint: bool,
    pub disposition: Disposition,
}

impl IngestOutcome {
    fn rejected(disposition: Disposition) -> Self {
        Self {
            accepted: false,
            scroll_hint: false,
            disposition,
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub confirmed: usize,
    pub pending: usize,
    pub failed: usize,
    pub appended: u64,
    pub replaced: u64,
    pub duplicates: u64,
    pub foreign: u64,
    pub malformed: u64,
}

/// Grouped view of a conversation at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub conversation: ConversationId,
    pub buckets: Vec<DateBucket>,
    pub stats: StoreStats,
}

// ----------------------------------------------------------------------------
// Conversation Store
// ----------------------------------------------------------------------------

/// Single mutation point for one conversation
#[derive(Debug)]
pub struct ConversationStore<T: TimeSource> {
    conversation: Conversation,
    pending: PendingRegistry,
    normalizer: MessageNormalizer<T>,
    reconciler: IdentityReconciler,
    scroll: ScrollPolicy,
    grouper: TimelineGrouper,
    viewport: ViewportMetrics,
    next_seq: u64,
    stats: StoreStats,
}

impl<T: TimeSource> ConversationStore<T> {
    pub fn new(participants: Participants, config: &ChatlineConfig, time_source: T) -> Self {
        Self {
            conversation: Conversation::new(participants),
            pending: PendingRegistry::new(),
            normalizer: MessageNormalizer::new(time_source),
            reconciler: IdentityReconciler::new(config.reconcile.clone()),
            scroll: ScrollPolicy::new(config.scroll.clone()),
            grouper: TimelineGrouper::new(config.timeline.zone()),
            viewport: ViewportMetrics::default(),
            next_seq: 0,
            stats: StoreStats::default(),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.conversation.id()
    }

    pub fn participants(&self) -> &Participants {
        self.conversation.participants()
    }

    pub fn grouper(&self) -> &TimelineGrouper {
        &self.grouper
    }

    pub fn time_source(&self) -> &T {
        self.normalizer.time_source()
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Register a locally composed message as pending and return it
    pub fn append_local(&mut self, draft: Draft) -> Result<Message> {
        let normalized = self
            .normalizer
            .normalize(RawPayload::Draft(draft), Some(self.conversation.participants()))?;
        self.ensure_member(&normalized.message)?;

        let message = normalized.message;
        let seq = self.bump_seq();
        self.pending.insert(message.clone(), seq);
        self.stats.appended += 1;

        debug!(
            conversation = %self.conversation.id(),
            id = %message.id,
            summary = %message.summary(),
            "local message pending"
        );
        Ok(message)
    }

    /// Apply a payload from the transport, the send collaborator or a replay
    pub fn ingest_remote(&mut self, raw: RawPayload) -> Result<IngestOutcome> {
        let source = raw.source();
        let normalized = match self
            .normalizer
            .normalize(raw, Some(self.conversation.participants()))
        {
            Ok(normalized) => normalized,
            Err(err) => {
                self.stats.malformed += 1;
                warn!(conversation = %self.conversation.id(), %source, error = %err, "discarding malformed payload");
                return Err(err.into());
            }
        };

        if normalized.message.delivery_state != DeliveryState::Delivered {
            warn!(conversation = %self.conversation.id(), %source, "refusing unsent message from remote path");
            return Err(PayloadError::Unsent { origin: source }.into());
        }

        if !self.conversation.accepts(&normalized.message) {
            self.stats.foreign += 1;
            warn!(
                conversation = %self.conversation.id(),
                sender = %normalized.message.sender_id,
                receiver = %normalized.message.receiver_id,
                %source,
                "ignoring payload for another conversation"
            );
            return Ok(IngestOutcome::rejected(Disposition::Foreign));
        }

        Ok(self.apply(normalized))
    }

    /// Pending → Failed
    pub fn mark_failed(&mut self, local_id: LocalId, failure: SendFailure) -> Result<Message> {
        let entry = self.pending.mark_failed(local_id, failure)?;
        info!(
            conversation = %self.conversation.id(),
            %local_id,
            failure = ?entry.failure,
            "send failed"
        );
        Ok(entry.message.clone())
    }

    /// Failed → new Pending message with a fresh local id
    ///
    /// The failed entry stays visible until it is discarded.
    pub fn retry(&mut self, local_id: LocalId) -> Result<Message> {
        let failed = self.failed_entry(local_id, "retry")?;

        let message = Message {
            id: MessageId::Local(LocalId::generate()),
            created_at: self.normalizer.time_source().now(),
            delivery_state: DeliveryState::Pending,
            is_local_echo: true,
            read: false,
            delivered: false,
            ..failed.message.clone()
        };

        let seq = self.bump_seq();
        self.pending.insert(message.clone(), seq);
        self.stats.appended += 1;

        info!(
            conversation = %self.conversation.id(),
            failed = %local_id,
            retry = %message.id,
            "retrying failed send"
        );
        Ok(message)
    }

    /// Failed → removed
    pub fn discard(&mut self, local_id: LocalId) -> Result<Message> {
        self.failed_entry(local_id, "discard")?;
        let entry = self
            .pending
            .remove(&local_id)
            .ok_or_else(|| ChatlineError::unknown_local_id(local_id))?;

        debug!(conversation = %self.conversation.id(), %local_id, "discarded failed message");
        Ok(entry.message)
    }

    pub fn set_viewport(&mut self, metrics: ViewportMetrics) {
        self.viewport = metrics;
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// All visible messages ordered by `created_at`, then insertion order
    pub fn messages(&self) -> Vec<Message> {
        let mut ordered: Vec<(&Message, u64)> = self
            .conversation
            .entries()
            .map(|entry| (&entry.message, entry.seq))
            .chain(
                self.pending
                    .entries()
                    .into_iter()
                    .map(|entry| (&entry.message, entry.seq)),
            )
            .collect();
        ordered.sort_by_key(|(message, seq)| (message.created_at, *seq));
        ordered.into_iter().map(|(message, _)| message.clone()).collect()
    }

    pub fn timeline(&self) -> Vec<DateBucket> {
        self.grouper.group(self.messages())
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            conversation: self.conversation.id().clone(),
            buckets: self.timeline(),
            stats: self.stats(),
        }
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        match id {
            MessageId::Local(local_id) => self
                .pending
                .get(local_id)
                .map(|entry| &entry.message)
                .or_else(|| self.conversation.get(id)),
            MessageId::Server(_) => self.conversation.get(id),
        }
    }

    /// Failure recorded for a failed message
    pub fn failure(&self, local_id: &LocalId) -> Option<&SendFailure> {
        self.pending.get(local_id).and_then(|entry| entry.failure.as_ref())
    }

    pub fn viewport(&self) -> ViewportMetrics {
        self.viewport
    }

    /// Pending messages older than `max_age`, for the collaborator that owns send timeouts
    pub fn stale_pending(&self, max_age: Duration) -> Vec<LocalId> {
        self.pending
            .stale(self.normalizer.time_source().now(), max_age)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            confirmed: self.conversation.len(),
            pending: self.pending.count_in(DeliveryState::Pending),
            failed: self.pending.count_in(DeliveryState::Failed),
            ..self.stats.clone()
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn apply(&mut self, normalized: Normalized) -> IngestOutcome {
        match self
            .reconciler
            .reconcile(&self.pending, &self.conversation, normalized)
        {
            Reconciliation::Duplicate { id } => {
                self.stats.duplicates += 1;
                debug!(conversation = %self.conversation.id(), %id, "duplicate delivery ignored");
                IngestOutcome::rejected(Disposition::Duplicate { id })
            }
            Reconciliation::Replace {
                local_id,
                mut message,
            } => {
                let seq = match self.pending.remove(&local_id) {
                    Some(entry) => {
                        // Terse acks carry only ids; keep what was composed
                        if message.content.is_none() && message.attachment.is_none() {
                            message.content = entry.message.content;
                            message.attachment = entry.message.attachment;
                        }
                        entry.seq
                    }
                    None => self.bump_seq(),
                };
                let scroll_hint = self.scroll_hint(&message);
                let id = message.id.clone();
                self.conversation.insert(message, seq);
                self.stats.replaced += 1;

                debug!(conversation = %self.conversation.id(), %local_id, %id, "pending message confirmed");
                IngestOutcome {
                    accepted: true,
                    scroll_hint,
                    disposition: Disposition::Replaced { local_id, id },
                }
            }
            Reconciliation::Append { message } => {
                let scroll_hint = self.scroll_hint(&message);
                let id = message.id.clone();
                let seq = self.bump_seq();

                self.conversation.insert(message, seq);
                self.stats.appended += 1;

                IngestOutcome {
                    accepted: true,
                    scroll_hint,
                    disposition: Disposition::Appended { id },
                }
            }
        }
    }

    fn scroll_hint(&self, message: &Message) -> bool {
        let is_local_sender = self.conversation.participants().is_local(&message.sender_id);
        self.scroll
            .should_auto_scroll(message, is_local_sender, self.viewport)
    }

    fn failed_entry(&self, local_id: LocalId, action: &'static str) -> Result<&PendingEntry> {
        let entry = self
            .pending
            .get(&local_id)
            .ok_or_else(|| ChatlineError::unknown_local_id(local_id))?;
        if entry.state() != DeliveryState::Failed {
            return Err(ChatlineError::invalid_transition(local_id, entry.state(), action));
        }
        Ok(entry)
    }

    fn ensure_member(&self, message: &Message) -> Result<()> {
        if self.conversation.accepts(message) {
            return Ok(());
        }
        Err(PayloadError::ForeignConversation {
            sender: message.sender_id.to_string(),
            receiver: message.receiver_id.to_string(),
            conversation: self.conversation.id().to_string(),
        }
        .into())
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{PayloadSource, PushEvent, SendAck};
    use crate::types::{SystemTimeSource, UserId};

    fn store() -> ConversationStore<SystemTimeSource> {
        ConversationStore::new(
            Participants::new("alice", "bob"),
            &ChatlineConfig::testing(),
            SystemTimeSource,
        )
    }

    fn ack(id: &str, content: &str, client_ref: Option<LocalId>) -> RawPayload {
        RawPayload::Ack(SendAck {
            id: id.into(),
            client_ref,
            sender_id: Some(UserId::from("alice")),
            receiver_id: Some(UserId::from("bob")),
            content: Some(content.into()),
            attachment: None,
            created_at: None,
            timestamp: None,
            read: None,
            delivered: Some(true),
        })
    }

    #[test]
    fn test_append_then_confirm_keeps_single_copy() {
        let mut store = store();
        let local = store.append_local(Draft::text("Hello")).unwrap();
        assert_eq!(store.messages().len(), 1);

        let outcome = store.ingest_remote(ack("42", "Hello", None)).unwrap();
        assert!(outcome.accepted);
        assert!(outcome.scroll_hint);
        assert_eq!(
            outcome.disposition,
            Disposition::Replaced {
                local_id: local.local_id().unwrap(),
                id: MessageId::server("42"),
            }
        );

        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, MessageId::server("42"));
        assert_eq!(messages[0].delivery_state, DeliveryState::Delivered);
    }

    #[test]
    fn test_duplicate_ack_is_counted() {
        let mut store = store();
        store.ingest_remote(ack("42", "Hello", None)).unwrap();
        let outcome = store.ingest_remote(ack("42", "Hello", None)).unwrap();

        assert!(!outcome.accepted);
        assert_eq!(store.stats().duplicates, 1);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_foreign_push_is_ignored() {
        let mut store = store();
        let outcome = store
            .ingest_remote(RawPayload::Push(PushEvent {
                id: Some("9".into()),
                sender_id: Some(UserId::from("mallory")),
                receiver_id: Some(UserId::from("bob")),
                content: Some("psst".into()),
                ..PushEvent::default()
            }))
            .unwrap();

        assert_eq!(outcome.disposition, Disposition::Foreign);
        assert!(store.messages().is_empty());
        assert_eq!(store.stats().foreign, 1);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let mut store = store();
        let result = store.ingest_remote(RawPayload::Push(PushEvent::default()));
        assert!(matches!(
            result,
            Err(ChatlineError::Payload(PayloadError::MissingSender))
        ));
        assert_eq!(store.stats().malformed, 1);
    }

    #[test]
    fn test_unsent_messages_are_refused_on_remote_path() {
        let mut store = store();

        let result = store.ingest_remote(RawPayload::Draft(Draft::text("x")));
        assert!(matches!(
            result,
            Err(ChatlineError::Payload(PayloadError::Unsent {
                origin: PayloadSource::Draft
            }))
        ));

        let local = store.append_local(Draft::text("y")).unwrap();
        let result = store.ingest_remote(RawPayload::Message(local));
        assert!(matches!(
            result,
            Err(ChatlineError::Payload(PayloadError::Unsent {
                origin: PayloadSource::Message
            }))
        ));

        let stats = store.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.appended, 1);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_state_machine_rejects_illegal_transitions() {
        let mut store = store();
        let local_id = store
            .append_local(Draft::text("hi"))
            .unwrap()
            .local_id()
            .unwrap();

        assert!(store.retry(local_id).is_err());
        assert!(store.discard(local_id).is_err());

        store.mark_failed(local_id, SendFailure::Cancelled).unwrap();
        assert!(store.mark_failed(local_id, SendFailure::Cancelled).is_err());
        assert_eq!(store.failure(&local_id), Some(&SendFailure::Cancelled));

        let discarded = store.discard(local_id).unwrap();
        assert_eq!(discarded.delivery_state, DeliveryState::Failed);
        assert!(store.messages().is_empty());
        assert!(store.discard(local_id).is_err());
    }

    #[test]
    fn test_draft_addressed_elsewhere_is_rejected() {
        let mut store = store();
        let result = store.append_local(Draft::text("hi").to_user("carol"));
        assert!(matches!(
            result,
            Err(ChatlineError::Payload(PayloadError::ForeignConversation { .. }))
        ));
    }
}
