//! Confirmed message set for one conversation
//!
//! Only messages whose identity is settled live here: server-confirmed sends
//! and remote deliveries. Anything still in flight or failed is owned by the
//! [`PendingRegistry`](crate::pending::PendingRegistry).

use hashbrown::HashMap;

use crate::message::{Message, MessageId};
use crate::types::{ConversationId, Participants};

/// Confirmed message with its insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedEntry {
    pub message: Message,
    pub seq: u64,
}

/// The deduplicated set of confirmed messages between two participants
#[derive(Debug, Clone)]
pub struct Conversation {
    participants: Participants,
    id: ConversationId,
    messages: HashMap<MessageId, ConfirmedEntry>,
}

impl Conversation {
    pub fn new(participants: Participants) -> Self {
        let id = participants.conversation_id();
        Self {
            participants,
            id,
            messages: HashMap::new(),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    /// Whether a sender/receiver pair belongs here
    pub fn accepts(&self, message: &Message) -> bool {
        self.id.matches_pair(&message.sender_id, &message.receiver_id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id).map(|entry| &entry.message)
    }

    /// Insert a confirmed message; returns false if its id is already present
    pub fn insert(&mut self, message: Message, seq: u64) -> bool {
        if self.messages.contains_key(&message.id) {
            return false;
        }
        self.messages
            .insert(message.id.clone(), ConfirmedEntry { message, seq });
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfirmedEntry> {
        self.messages.values()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::DeliveryState;
    use crate::types::{Timestamp, UserId};

    fn delivered(id: &str, sender: &str, receiver: &str) -> Message {
        Message {
            id: MessageId::server(id),
            sender_id: UserId::from(sender),
            receiver_id: UserId::from(receiver),
            content: Some("hi".into()),
            attachment: None,
            created_at: Timestamp::new(0),
            delivery_state: DeliveryState::Delivered,
            is_local_echo: false,
            read: false,
            delivered: false,
        }
    }

    #[test]
    fn test_insert_rejects_duplicate_ids() {
        let mut conversation = Conversation::new(Participants::new("alice", "bob"));
        assert!(conversation.insert(delivered("1", "bob", "alice"), 0));
        assert!(!conversation.insert(delivered("1", "bob", "alice"), 1));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_accepts_only_its_pair() {
        let conversation = Conversation::new(Participants::new("alice", "bob"));
        assert!(conversation.accepts(&delivered("1", "alice", "bob")));
        assert!(conversation.accepts(&delivered("1", "bob", "alice")));
        assert!(!conversation.accepts(&delivered("1", "carol", "alice")));
    }
}
