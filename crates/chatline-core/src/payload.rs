//! Raw payload shapes accepted at the ingestion boundary
//!
//! Each producer (compose surface, send acknowledgment, push delivery) gets its
//! own variant. Field spelling differences between producers (`createdAt`
//! versus `created_at`, `type` versus `mime`) are absorbed by serde aliases
//! here so nothing past the normalizer ever inspects which field was present.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::message::{LocalId, Message};
use crate::types::UserId;

/// Attachment as described by a producer, before classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub url: String,
    #[serde(
        default,
        alias = "type",
        alias = "mimeType",
        alias = "mime_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub mime: Option<String>,
}

impl AttachmentDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Producer Shapes
// ----------------------------------------------------------------------------

/// Message composed on this device, not yet sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Defaults to the local participant
    #[serde(default, alias = "senderId")]
    pub sender_id: Option<UserId>,
    /// Defaults to the counterpart
    #[serde(default, alias = "receiverId")]
    pub receiver_id: Option<UserId>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentDescriptor>,
    /// Compose time; defaults to now
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<u64>,
}

impl Draft {
    /// Draft with text content addressed to the conversation counterpart
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Draft carrying only an attachment
    pub fn attachment(descriptor: AttachmentDescriptor) -> Self {
        Self {
            attachment: Some(descriptor),
            ..Self::default()
        }
    }

    pub fn from_user(mut self, sender: impl Into<UserId>) -> Self {
        self.sender_id = Some(sender.into());
        self
    }

    pub fn to_user(mut self, receiver: impl Into<UserId>) -> Self {
        self.receiver_id = Some(receiver.into());
        self
    }

    pub fn at(mut self, created_at_ms: u64) -> Self {
        self.created_at = Some(created_at_ms);
        self
    }
}

/// Server acknowledgment of a message sent from this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    /// Server-assigned id
    pub id: String,
    /// Synthetic id chosen by this device, when the send API echoes it back
    #[serde(default, alias = "clientRef", alias = "localId")]
    pub client_ref: Option<LocalId>,
    #[serde(default, alias = "senderId")]
    pub sender_id: Option<UserId>,
    #[serde(default, alias = "receiverId")]
    pub receiver_id: Option<UserId>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentDescriptor>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub delivered: Option<bool>,
}

/// Message delivered by the push channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "senderId")]
    pub sender_id: Option<UserId>,
    #[serde(default, alias = "receiverId")]
    pub receiver_id: Option<UserId>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentDescriptor>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub delivered: Option<bool>,
}

// ----------------------------------------------------------------------------
// Raw Payload
// ----------------------------------------------------------------------------

/// Any payload the pipeline accepts, tagged by producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RawPayload {
    Draft(Draft),
    Ack(SendAck),
    Push(PushEvent),
    /// A message that already went through normalization
    Message(Message),
}

/// Producer of a payload, kept for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    Draft,
    Ack,
    Push,
    Message,
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayloadSource::Draft => "draft",
            PayloadSource::Ack => "ack",
            PayloadSource::Push => "push",
            PayloadSource::Message => "message",
        };
        f.write_str(name)
    }
}

impl RawPayload {
    pub fn source(&self) -> PayloadSource {
        match self {
            RawPayload::Draft(_) => PayloadSource::Draft,
            RawPayload::Ack(_) => PayloadSource::Ack,
            RawPayload::Push(_) => PayloadSource::Push,
            RawPayload::Message(_) => PayloadSource::Message,
        }
    }

    /// Sender and receiver as carried by the payload, before any recovery
    pub fn parties(&self) -> (Option<&UserId>, Option<&UserId>) {
        match self {
            RawPayload::Draft(d) => (d.sender_id.as_ref(), d.receiver_id.as_ref()),
            RawPayload::Ack(a) => (a.sender_id.as_ref(), a.receiver_id.as_ref()),
            RawPayload::Push(p) => (p.sender_id.as_ref(), p.receiver_id.as_ref()),
            RawPayload::Message(m) => (Some(&m.sender_id), Some(&m.receiver_id)),
        }
    }

    /// Decode a JSON payload as delivered by the transport
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<Draft> for RawPayload {
    fn from(draft: Draft) -> Self {
        RawPayload::Draft(draft)
    }
}

impl From<SendAck> for RawPayload {
    fn from(ack: SendAck) -> Self {
        RawPayload::Ack(ack)
    }
}

impl From<PushEvent> for RawPayload {
    fn from(push: PushEvent) -> Self {
        RawPayload::Push(push)
    }
}

impl From<Message> for RawPayload {
    fn from(message: Message) -> Self {
        RawPayload::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_accepts_camel_case_fields() {
        let raw = RawPayload::from_json(
            r#"{"source":"push","id":"7","senderId":"bob","receiverId":"alice",
                "content":"hey","timestamp":1704099600,
                "attachment":{"url":"https://x.io/a.png","type":"image/png"}}"#,
        )
        .unwrap();

        let RawPayload::Push(push) = raw else {
            panic!("expected push payload");
        };
        assert_eq!(push.sender_id, Some(UserId::from("bob")));
        assert_eq!(push.timestamp, Some(1_704_099_600));
        assert_eq!(push.created_at, None);
        assert_eq!(push.attachment.unwrap().mime.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_ack_with_echoed_client_ref() {
        let local = LocalId::generate();
        let json = format!(
            r#"{{"source":"ack","id":"42","clientRef":"{}","createdAt":1704099601000}}"#,
            local.as_uuid()
        );
        let RawPayload::Ack(ack) = RawPayload::from_json(&json).unwrap() else {
            panic!("expected ack payload");
        };
        assert_eq!(ack.client_ref, Some(local));
        assert_eq!(ack.created_at, Some(1_704_099_601_000));
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(RawPayload::from_json(r#"{"source":"carrier_pigeon"}"#).is_err());
    }
}
