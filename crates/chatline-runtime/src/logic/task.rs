//! Conversation Task Implementation
//!
//! Contains the ConversationTask actor and its command dispatch.

use chatline_core::channel::{
    AppEvent, AppEventSender, ChannelError, Command, CommandReceiver, Effect, EffectSender,
    NonBlockingSend, Reply,
};
use chatline_core::{
    ChatlineError, ChatlineResult, ConversationId, ConversationStore, Message, SendFailure,
    TimeSource,
};
use tracing::{debug, error, info, warn};

use super::state::TaskStats;

// ----------------------------------------------------------------------------
// Conversation Task
// ----------------------------------------------------------------------------

/// Owns one conversation's store and applies its commands strictly in order
pub struct ConversationTask<T: TimeSource> {
    store: ConversationStore<T>,
    command_receiver: CommandReceiver,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,
    stats: TaskStats,
    running: bool,
}

impl<T: TimeSource> ConversationTask<T> {
    pub fn new(
        store: ConversationStore<T>,
        command_receiver: CommandReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            store,
            command_receiver,
            effect_sender,
            app_event_sender,
            stats: TaskStats::default(),
            running: true,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.store.conversation_id()
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    pub fn store(&self) -> &ConversationStore<T> {
        &self.store
    }

    /// Run until shutdown or until every command sender is dropped
    pub async fn run(&mut self) -> ChatlineResult<()> {
        info!(conversation = %self.conversation_id(), "Conversation task starting");

        while self.running {
            let Some(command) = self.command_receiver.recv().await else {
                info!(conversation = %self.conversation_id(), "Command channel closed, shutting down");
                break;
            };

            let name = command.name();
            if let Err(e) = self.process_command(command).await {
                if e.is_recoverable() {
                    warn!(conversation = %self.conversation_id(), command = name, "Error processing command: {}", e);
                } else {
                    error!(
                        conversation = %self.conversation_id(),
                        command = name,
                        "Unrecoverable error processing command, shutting down: {}", e
                    );
                    self.running = false;
                    self.emit(AppEvent::ConversationClosed {
                        conversation: self.conversation_id().clone(),
                    });
                    return Err(e);
                }
            }
        }

        self.emit(AppEvent::ConversationClosed {
            conversation: self.conversation_id().clone(),
        });
        info!(
            conversation = %self.conversation_id(),
            commands = self.stats.commands_processed,
            "Conversation task stopped"
        );
        Ok(())
    }

    /// Stop after the current command
    pub fn stop(&mut self) {
        self.running = false;
    }

    async fn process_command(&mut self, command: Command) -> ChatlineResult<()> {
        self.stats.commands_processed += 1;
        debug!(conversation = %self.conversation_id(), command = command.name(), "processing command");

        match command {
            Command::AppendLocal { draft, reply } => {
                let result = self.store.append_local(draft);
                if let Ok(message) = &result {
                    self.transmit(message.clone()).await?;
                    self.publish_timeline(true);
                }
                respond(reply, result, "append_local");
            }
            Command::IngestRemote { payload, reply } => {
                let result = self.store.ingest_remote(payload);
                if let Ok(outcome) = &result {
                    if outcome.accepted {
                        self.publish_timeline(outcome.scroll_hint);
                    }
                }
                respond(reply, result, "ingest_remote");
            }
            Command::MarkFailed {
                local_id,
                failure,
                reply,
            } => {
                let result = self.store.mark_failed(local_id, failure.clone());
                if result.is_ok() {
                    self.announce_failure(&failure, local_id);
                    self.publish_timeline(false);
                }
                respond(reply, result, "mark_failed");
            }
            Command::Retry { local_id, reply } => {
                let result = self.store.retry(local_id);
                if let Ok(message) = &result {
                    self.transmit(message.clone()).await?;
                    self.publish_timeline(true);
                }
                respond(reply, result, "retry");
            }
            Command::Discard { local_id, reply } => {
                let result = self.store.discard(local_id);
                if result.is_ok() {
                    self.publish_timeline(false);
                }
                respond(reply, result, "discard");
            }
            Command::SetViewport { metrics } => {
                self.store.set_viewport(metrics);
            }
            Command::Snapshot { reply } => {
                // Requester may have given up waiting
                let _ = reply.send(self.store.snapshot());
            }
            Command::Shutdown => {
                self.running = false;
            }
        }

        Ok(())
    }

    /// Hand a pending message to the send collaborator
    async fn transmit(&mut self, message: Message) -> ChatlineResult<()> {
        let effect = Effect::Transmit {
            conversation: self.conversation_id().clone(),
            message,
        };
        self.effect_sender
            .send(effect)
            .await
            .map_err(|_| ChatlineError::channel_error("Effect channel closed"))?;
        self.stats.effects_generated += 1;
        Ok(())
    }

    fn announce_failure(&mut self, failure: &SendFailure, local_id: chatline_core::LocalId) {
        let conversation = self.conversation_id().clone();
        if matches!(failure, SendFailure::SessionExpired) {
            self.emit(AppEvent::SessionExpired {
                conversation: conversation.clone(),
                local_id,
            });
        }
        self.emit(AppEvent::SendFailed {
            conversation,
            local_id,
            failure: failure.clone(),
        });
    }

    fn publish_timeline(&mut self, scroll_hint: bool) {
        self.emit(AppEvent::TimelineUpdated {
            conversation: self.conversation_id().clone(),
            buckets: self.store.timeline(),
            scroll_hint,
        });
    }

    /// Deliver an app event without ever blocking the conversation
    fn emit(&mut self, event: AppEvent) {
        match self.app_event_sender.try_send_non_blocking(event) {
            Ok(()) => self.stats.app_events_generated += 1,
            Err(ChannelError::ChannelFull) => {
                self.stats.app_events_dropped += 1;
                warn!(conversation = %self.conversation_id(), "App event channel full, dropping event");
            }
            Err(ChannelError::ChannelClosed) => {
                self.stats.app_events_dropped += 1;
                debug!(conversation = %self.conversation_id(), "App event receiver gone");
            }
        }
    }
}

/// Send a command result back, or log it when nobody asked
fn respond<R>(reply: Option<Reply<R>>, result: ChatlineResult<R>, command: &'static str) {
    match reply {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => {
            if let Err(e) = result {
                warn!(command, "Command failed with no caller waiting: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
    };
    use chatline_core::{ChatlineConfig, Draft, Participants, SystemTimeSource};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_append_local_emits_transmit_and_timeline() {
        let config = ChatlineConfig::testing();
        let (command_sender, command_receiver) = create_command_channel(&config.channels);
        let (effect_sender, mut effect_receiver) = create_effect_channel(&config.channels);
        let (app_event_sender, mut app_event_receiver) =
            create_app_event_channel(&config.channels);

        let store = ConversationStore::new(
            Participants::new("alice", "bob"),
            &config,
            SystemTimeSource,
        );
        let mut task =
            ConversationTask::new(store, command_receiver, effect_sender, app_event_sender);
        let handle = tokio::spawn(async move { task.run().await });

        let (reply, response) = oneshot::channel();
        command_sender
            .send(Command::AppendLocal {
                draft: Draft::text("hi"),
                reply: Some(reply),
            })
            .await
            .unwrap();
        let message = response.await.unwrap().unwrap();

        let Some(Effect::Transmit { message: sent, .. }) = effect_receiver.recv().await else {
            panic!("expected transmit effect");
        };
        assert_eq!(sent.id, message.id);

        match app_event_receiver.recv().await {
            Some(AppEvent::TimelineUpdated { scroll_hint, buckets, .. }) => {
                assert!(scroll_hint);
                assert_eq!(buckets.len(), 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        command_sender.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
        assert!(matches!(
            app_event_receiver.recv().await,
            Some(AppEvent::ConversationClosed { .. })
        ));
    }
}
