//! Conversation Supervisor
//!
//! Keeps one `ConversationTask` per counterpart, spawning tasks lazily and
//! routing incoming payloads to the task of the conversation they belong to.
//! All tasks share one effect queue and one app event queue; every item on
//! them carries its conversation id.

use std::time::Duration;

use chatline_core::channel::{create_command_channel, AppEventSender, EffectSender};
use chatline_core::{
    ChatlineError, ChatlineResult, ConversationId, ConversationStore, IngestOutcome, PayloadError,
    Participants, RawPayload, SharedChatlineConfig, TimeSource, UserId,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::logic::{ConversationHandle, ConversationTask};

/// Time each task gets to drain its queue on shutdown before it is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Supervisor
// ----------------------------------------------------------------------------

struct ConversationEntry {
    handle: ConversationHandle,
    join_handle: JoinHandle<ChatlineResult<()>>,
}

/// Registry of live conversation tasks for one local user
pub struct Supervisor<T> {
    local: UserId,
    config: SharedChatlineConfig,
    time_source: T,
    conversations: DashMap<ConversationId, ConversationEntry>,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,
}

impl<T> Supervisor<T>
where
    T: TimeSource + Clone + Send + Sync + 'static,
{
    pub fn new(
        local: UserId,
        config: SharedChatlineConfig,
        time_source: T,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            local,
            config,
            time_source,
            conversations: DashMap::new(),
            effect_sender,
            app_event_sender,
        }
    }

    pub fn local_user(&self) -> &UserId {
        &self.local
    }

    /// Handle for the conversation with `counterpart`, spawning its task on first use
    ///
    /// A conversation whose task has stopped is started again with an empty store.
    pub fn open(&self, counterpart: impl Into<UserId>) -> ChatlineResult<ConversationHandle> {
        let counterpart = counterpart.into();
        if counterpart == self.local {
            return Err(ChatlineError::config_error(format!(
                "Cannot open a conversation between {} and itself",
                self.local
            )));
        }

        let participants = Participants::new(self.local.clone(), counterpart);
        match self.conversations.entry(participants.conversation_id()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().handle.is_closed() {
                    return Ok(occupied.get().handle.clone());
                }
                info!(conversation = %occupied.key(), "Restarting stopped conversation task");
                let entry = self.spawn(participants);
                let handle = entry.handle.clone();
                occupied.insert(entry);
                Ok(handle)
            }
            Entry::Vacant(vacant) => {
                let entry = self.spawn(participants);
                let handle = entry.handle.clone();
                vacant.insert(entry);
                Ok(handle)
            }
        }
    }

    /// Handle for an already running conversation
    pub fn handle(&self, conversation: &ConversationId) -> Option<ConversationHandle> {
        self.conversations
            .get(conversation)
            .map(|entry| entry.handle.clone())
            .filter(|handle| !handle.is_closed())
    }

    pub fn conversations(&self) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> = self
            .conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Deliver a payload to the conversation it belongs to
    ///
    /// Returns `Ok(None)` for payloads exchanged between two other users.
    pub async fn route(&self, payload: RawPayload) -> ChatlineResult<Option<IngestOutcome>> {
        let counterpart = match self.counterpart_of(&payload) {
            Ok(Some(counterpart)) => counterpart,
            Ok(None) => {
                let (sender, receiver) = payload.parties();
                warn!(
                    source = %payload.source(),
                    sender = ?sender.map(UserId::as_str),
                    receiver = ?receiver.map(UserId::as_str),
                    "Ignoring payload that does not involve {}", self.local
                );
                return Ok(None);
            }
            Err(e) => {
                warn!(source = %payload.source(), "Cannot route payload: {}", e);
                return Err(e.into());
            }
        };

        let handle = self.open(counterpart)?;
        handle.ingest_remote(payload).await.map(Some)
    }

    /// Stop one conversation and wait for its task to finish
    pub async fn close(&self, conversation: &ConversationId) -> ChatlineResult<()> {
        let Some((_, entry)) = self.conversations.remove(conversation) else {
            return Ok(());
        };
        stop_entry(conversation, entry).await
    }

    /// Stop every conversation task
    pub async fn shutdown_all(&self) -> ChatlineResult<()> {
        let ids: Vec<ConversationId> = self
            .conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        info!(conversations = ids.len(), "Shutting down conversation tasks");

        for id in ids {
            if let Some((id, entry)) = self.conversations.remove(&id) {
                if let Err(e) = stop_entry(&id, entry).await {
                    warn!(conversation = %id, "Conversation task ended with error: {}", e);
                }
            }
        }
        Ok(())
    }

    fn spawn(&self, participants: Participants) -> ConversationEntry {
        let conversation = participants.conversation_id();
        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let store = ConversationStore::new(participants, &self.config, self.time_source.clone());
        let mut task = ConversationTask::new(
            store,
            command_receiver,
            self.effect_sender.clone(),
            self.app_event_sender.clone(),
        );

        debug!(conversation = %conversation, "Spawning conversation task");
        let join_handle = tokio::spawn(async move { task.run().await });

        ConversationEntry {
            handle: ConversationHandle::new(conversation, command_sender),
            join_handle,
        }
    }

    /// Counterpart named by a payload, or `None` when the local user is not a party
    fn counterpart_of(&self, payload: &RawPayload) -> Result<Option<UserId>, PayloadError> {
        let local = &self.local;
        match payload.parties() {
            (Some(sender), Some(receiver)) => {
                if sender == local && receiver != local {
                    Ok(Some(receiver.clone()))
                } else if receiver == local && sender != local {
                    Ok(Some(sender.clone()))
                } else {
                    Ok(None)
                }
            }
            // The missing side must be the local user
            (Some(sender), None) if sender != local => Ok(Some(sender.clone())),
            (None, Some(receiver)) if receiver != local => Ok(Some(receiver.clone())),
            (Some(_), None) => Err(PayloadError::MissingParticipants),
            (None, Some(_)) | (None, None) => Err(PayloadError::MissingSender),
        }
    }
}

async fn stop_entry(conversation: &ConversationId, entry: ConversationEntry) -> ChatlineResult<()> {
    // Already stopped tasks have dropped their queue
    let _ = entry.handle.shutdown().await;

    let mut join_handle = entry.join_handle;
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut join_handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ChatlineError::channel_error(format!(
            "Conversation task {} panicked: {}",
            conversation, e
        ))),
        Err(_) => {
            warn!(conversation = %conversation, "Conversation task did not stop in time, aborting");
            join_handle.abort();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::channel::{create_app_event_channel, create_effect_channel};
    use chatline_core::{ChatlineConfig, PushEvent, SystemTimeSource};

    fn supervisor() -> Supervisor<SystemTimeSource> {
        let config = ChatlineConfig::testing();
        let (effect_sender, _effect_receiver) = create_effect_channel(&config.channels);
        let (app_event_sender, _app_event_receiver) = create_app_event_channel(&config.channels);
        Supervisor::new(
            UserId::from("alice"),
            config.into_shared(),
            SystemTimeSource,
            effect_sender,
            app_event_sender,
        )
    }

    fn push(sender: Option<&str>, receiver: Option<&str>) -> RawPayload {
        RawPayload::Push(PushEvent {
            id: Some("1".into()),
            sender_id: sender.map(UserId::from),
            receiver_id: receiver.map(UserId::from),
            content: Some("hi".into()),
            ..PushEvent::default()
        })
    }

    #[tokio::test]
    async fn test_counterpart_resolution() {
        let supervisor = supervisor();
        let bob = Some(UserId::from("bob"));

        assert_eq!(supervisor.counterpart_of(&push(Some("bob"), Some("alice"))), Ok(bob.clone()));
        assert_eq!(supervisor.counterpart_of(&push(Some("alice"), Some("bob"))), Ok(bob.clone()));
        assert_eq!(supervisor.counterpart_of(&push(Some("bob"), None)), Ok(bob.clone()));
        assert_eq!(supervisor.counterpart_of(&push(None, Some("bob"))), Ok(bob));
        assert_eq!(supervisor.counterpart_of(&push(Some("carol"), Some("bob"))), Ok(None));
        assert_eq!(
            supervisor.counterpart_of(&push(Some("alice"), None)),
            Err(PayloadError::MissingParticipants)
        );
        assert_eq!(
            supervisor.counterpart_of(&push(None, None)),
            Err(PayloadError::MissingSender)
        );
    }

    #[tokio::test]
    async fn test_open_reuses_running_task() {
        let supervisor = supervisor();
        let first = supervisor.open("bob").unwrap();
        let second = supervisor.open("bob").unwrap();
        assert_eq!(first.conversation_id(), second.conversation_id());
        assert_eq!(supervisor.len(), 1);

        assert!(supervisor.open("alice").is_err());
        supervisor.shutdown_all().await.unwrap();
        assert!(supervisor.is_empty());
    }
}
