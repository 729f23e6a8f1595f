//! Message normalization
//!
//! Turns every [`RawPayload`] variant into the canonical [`Message`] shape:
//! - `created_at` is the first present of {created_at, timestamp, now}
//! - `id` is the server id when one exists, otherwise a fresh synthetic id
//! - missing `read`/`delivered` flags default to false
//! - attachments are classified
//!
//! Normalizing an already-normalized message returns it unchanged, so
//! re-ingesting the same event can never corrupt state.

use tracing::debug;

use crate::attachment;
use crate::errors::PayloadError;
use crate::message::{Attachment, DeliveryState, LocalId, Message, MessageId};
use crate::payload::{AttachmentDescriptor, PayloadSource, RawPayload};
use crate::types::{Participants, TimeSource, Timestamp, UserId};

/// Output of normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub message: Message,
    /// Synthetic id echoed back by the send API, if any
    pub client_ref: Option<LocalId>,
    pub source: PayloadSource,
}

/// Normalizer bound to a time source for the "now" fallback
#[derive(Debug, Clone)]
pub struct MessageNormalizer<T: TimeSource> {
    time_source: T,
}

impl<T: TimeSource> MessageNormalizer<T> {
    pub fn new(time_source: T) -> Self {
        Self { time_source }
    }

    pub fn time_source(&self) -> &T {
        &self.time_source
    }

    /// Normalize a payload, recovering missing participants from `participants`
    pub fn normalize(
        &self,
        raw: RawPayload,
        participants: Option<&Participants>,
    ) -> Result<Normalized, PayloadError> {
        normalize(raw, participants, self.time_source.now())
    }
}

/// Normalize a payload against an explicit "now"
pub fn normalize(
    raw: RawPayload,
    participants: Option<&Participants>,
    now: Timestamp,
) -> Result<Normalized, PayloadError> {
    let source = raw.source();
    match raw {
        RawPayload::Message(message) => Ok(Normalized {
            message: renormalize(message),
            client_ref: None,
            source,
        }),
        RawPayload::Draft(draft) => {
            let sender = draft
                .sender_id
                .or_else(|| participants.map(|p| p.local.clone()));
            let receiver = draft
                .receiver_id
                .or_else(|| participants.map(|p| p.counterpart.clone()));
            let (sender_id, receiver_id) = resolve_participants(sender, receiver, participants)?;

            let message = Message {
                id: MessageId::Local(LocalId::generate()),
                sender_id,
                receiver_id,
                content: non_empty(draft.content),
                attachment: draft.attachment.and_then(classify_descriptor),
                created_at: first_timestamp(draft.created_at, None, now),
                delivery_state: DeliveryState::Pending,
                is_local_echo: true,
                read: false,
                delivered: false,
            };
            Ok(Normalized {
                message,
                client_ref: None,
                source,
            })
        }
        RawPayload::Ack(ack) => {
            // Acks only ever confirm this device's own sends
            let sender = ack
                .sender_id
                .or_else(|| participants.map(|p| p.local.clone()));
            let (sender_id, receiver_id) =
                resolve_participants(sender, ack.receiver_id, participants)?;

            let message = Message {
                id: server_or_synthetic(Some(ack.id)),
                sender_id,
                receiver_id,
                content: non_empty(ack.content),
                attachment: ack.attachment.and_then(classify_descriptor),
                created_at: first_timestamp(ack.created_at, ack.timestamp, now),
                delivery_state: DeliveryState::Delivered,
                is_local_echo: false,
                read: ack.read.unwrap_or(false),
                delivered: ack.delivered.unwrap_or(false),
            };
            Ok(Normalized {
                message,
                client_ref: ack.client_ref,
                source,
            })
        }
        RawPayload::Push(push) => {
            let (sender_id, receiver_id) =
                resolve_participants(push.sender_id, push.receiver_id, participants)?;

            let message = Message {
                id: server_or_synthetic(push.id),
                sender_id,
                receiver_id,
                content: non_empty(push.content),
                attachment: push.attachment.and_then(classify_descriptor),
                created_at: first_timestamp(push.created_at, push.timestamp, now),
                delivery_state: DeliveryState::Delivered,
                is_local_echo: false,
                read: push.read.unwrap_or(false),
                delivered: push.delivered.unwrap_or(false),
            };
            Ok(Normalized {
                message,
                client_ref: None,
                source,
            })
        }
    }
}

// ----------------------------------------------------------------------------
// Rules
// ----------------------------------------------------------------------------

/// Apply the content rules to a message that is already canonical
fn renormalize(mut message: Message) -> Message {
    message.content = non_empty(message.content);
    if message
        .attachment
        .as_ref()
        .is_some_and(|attachment| attachment.url.is_empty())
    {
        message.attachment = None;
    }
    message
}

fn first_timestamp(created_at: Option<u64>, timestamp: Option<u64>, now: Timestamp) -> Timestamp {
    created_at
        .or(timestamp)
        .map(Timestamp::from_epoch_value)
        .unwrap_or(now)
}

fn server_or_synthetic(server_id: Option<String>) -> MessageId {
    match server_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => MessageId::Server(id),
        None => MessageId::Local(LocalId::generate()),
    }
}

fn non_empty(content: Option<String>) -> Option<String> {
    content.filter(|text| !text.is_empty())
}

fn classify_descriptor(descriptor: AttachmentDescriptor) -> Option<Attachment> {
    if descriptor.url.is_empty() {
        return None;
    }
    let kind = attachment::classify(Some(&descriptor.url), descriptor.mime.as_deref());
    Some(Attachment {
        url: descriptor.url,
        kind,
    })
}

/// Fill in a missing side of the sender/receiver pair from the conversation
///
/// The payload is only rejected when the sender cannot be determined.
fn resolve_participants(
    sender: Option<UserId>,
    receiver: Option<UserId>,
    participants: Option<&Participants>,
) -> Result<(UserId, UserId), PayloadError> {
    let opposite = |user: &UserId| participants.and_then(|p| p.other_side(user)).cloned();

    match (sender, receiver) {
        (Some(sender), Some(receiver)) => Ok((sender, receiver)),
        (Some(sender), None) => {
            let receiver = opposite(&sender).ok_or(PayloadError::MissingParticipants)?;
            debug!(%sender, %receiver, "recovered missing receiver");
            Ok((sender, receiver))
        }
        (None, Some(receiver)) => {
            let sender = opposite(&receiver).ok_or(PayloadError::MissingSender)?;
            debug!(%sender, %receiver, "recovered missing sender");
            Ok((sender, receiver))
        }
        (None, None) => Err(PayloadError::MissingSender),
    }
}
