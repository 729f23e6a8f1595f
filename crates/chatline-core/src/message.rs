//! Canonical message model
//!
//! Every source of messages (compose surface, send acknowledgments, push
//! delivery) ends up as a [`Message`] before any other component looks at it.

use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::AttachmentKind;
use crate::types::{Timestamp, UserId};

// ----------------------------------------------------------------------------
// Identifiers
// ----------------------------------------------------------------------------

/// Synthetic identifier generated on this device before a server id is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Generate a fresh random local id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

/// Message identifier, either authoritative or synthetic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageId {
    /// Assigned by the server; authoritative
    Server(String),
    /// Assigned locally; replaced once the message is confirmed
    Local(LocalId),
}

impl MessageId {
    pub fn server(id: impl Into<String>) -> Self {
        MessageId::Server(id.into())
    }

    pub fn as_server(&self) -> Option<&str> {
        match self {
            MessageId::Server(id) => Some(id),
            MessageId::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            MessageId::Local(id) => Some(*id),
            MessageId::Server(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Server(id) => f.write_str(id),
            MessageId::Local(id) => write!(f, "{}", id),
        }
    }
}

impl From<LocalId> for MessageId {
    fn from(id: LocalId) -> Self {
        MessageId::Local(id)
    }
}

// ----------------------------------------------------------------------------
// Delivery State
// ----------------------------------------------------------------------------

/// Lifecycle state of a visible message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Composed locally, awaiting server confirmation
    Pending,
    /// Confirmed by the server or received from a remote sender
    Delivered,
    /// The send collaborator reported an error
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered)
    }
}

/// Reason a send did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendFailure {
    #[error("network error: {reason}")]
    Network { reason: String },
    #[error("rejected by server: {reason}")]
    Rejected { reason: String },
    #[error("session expired")]
    SessionExpired,
    #[error("send cancelled")]
    Cancelled,
}

impl SendFailure {
    /// Whether re-sending without user intervention could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendFailure::Network { .. } | SendFailure::Cancelled)
    }
}

// ----------------------------------------------------------------------------
// Attachment
// ----------------------------------------------------------------------------

/// Attachment reference carried by a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub kind: AttachmentKind,
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// One communicative act in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
    /// Authoritative ordering key
    pub created_at: Timestamp,
    pub delivery_state: DeliveryState,
    /// Rendered optimistically from this device
    pub is_local_echo: bool,
    pub read: bool,
    pub delivered: bool,
}

impl Message {
    /// Text content if present and not blank
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|content| !content.trim().is_empty())
    }

    pub fn attachment_url(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.url.as_str())
    }

    pub fn local_id(&self) -> Option<LocalId> {
        self.id.as_local()
    }

    pub fn server_id(&self) -> Option<&str> {
        self.id.as_server()
    }

    pub fn is_pending(&self) -> bool {
        self.delivery_state == DeliveryState::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.delivery_state == DeliveryState::Failed
    }

    /// Short description for logs
    pub fn summary(&self) -> String {
        match (self.text(), &self.attachment) {
            (Some(text), _) => {
                let mut preview: String = text.chars().take(24).collect();
                if text.chars().count() > 24 {
                    preview.push('…');
                }
                preview
            }
            (None, Some(attachment)) => format!("[{}]", attachment.kind),
            (None, None) => "[empty]".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: Option<&str>) -> Message {
        Message {
            id: MessageId::server("1"),
            sender_id: UserId::from("a"),
            receiver_id: UserId::from("b"),
            content: content.map(str::to_string),
            attachment: None,
            created_at: Timestamp::new(0),
            delivery_state: DeliveryState::Delivered,
            is_local_echo: false,
            read: false,
            delivered: false,
        }
    }

    #[test]
    fn test_blank_content_is_not_text() {
        assert_eq!(message(Some("   ")).text(), None);
        assert_eq!(message(Some("hi")).text(), Some("hi"));
        assert_eq!(message(None).text(), None);
    }

    #[test]
    fn test_message_id_accessors() {
        let local = LocalId::generate();
        let id = MessageId::from(local);
        assert_eq!(id.as_local(), Some(local));
        assert_eq!(id.as_server(), None);
        assert!(id.to_string().starts_with("local-"));
        assert_eq!(MessageId::server("42").as_server(), Some("42"));
    }

    #[test]
    fn test_summary_truncates() {
        let long = message(Some("abcdefghijklmnopqrstuvwxyz0123"));
        assert_eq!(long.summary().chars().count(), 25);
        assert_eq!(message(None).summary(), "[empty]");
    }

    #[test]
    fn test_send_failure_retryable() {
        assert!(SendFailure::Network {
            reason: "timeout".into()
        }
        .is_retryable());
        assert!(!SendFailure::SessionExpired.is_retryable());
    }
}
