//! Conversation Handle
//!
//! Typed async front end over a conversation task's command queue.

use chatline_core::channel::{Command, CommandSender};
use chatline_core::{
    ChatlineError, ChatlineResult, ConversationId, Draft, IngestOutcome, LocalId, Message,
    RawPayload, SendFailure, TimelineSnapshot, ViewportMetrics,
};
use tokio::sync::oneshot;

/// Cloneable sender side of one conversation task
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    conversation: ConversationId,
    command_sender: CommandSender,
}

impl ConversationHandle {
    pub fn new(conversation: ConversationId, command_sender: CommandSender) -> Self {
        Self {
            conversation,
            command_sender,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation
    }

    /// True once the task has stopped and dropped its queue
    pub fn is_closed(&self) -> bool {
        self.command_sender.is_closed()
    }

    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Enqueue a command without waiting for its result
    pub async fn send_command(&self, command: Command) -> ChatlineResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| self.closed())
    }

    pub async fn append_local(&self, draft: Draft) -> ChatlineResult<Message> {
        self.request(|reply| Command::AppendLocal {
            draft,
            reply: Some(reply),
        })
        .await
    }

    pub async fn ingest_remote(&self, payload: RawPayload) -> ChatlineResult<IngestOutcome> {
        self.request(|reply| Command::IngestRemote {
            payload,
            reply: Some(reply),
        })
        .await
    }

    pub async fn mark_failed(
        &self,
        local_id: LocalId,
        failure: SendFailure,
    ) -> ChatlineResult<Message> {
        self.request(|reply| Command::MarkFailed {
            local_id,
            failure,
            reply: Some(reply),
        })
        .await
    }

    pub async fn retry(&self, local_id: LocalId) -> ChatlineResult<Message> {
        self.request(|reply| Command::Retry {
            local_id,
            reply: Some(reply),
        })
        .await
    }

    pub async fn discard(&self, local_id: LocalId) -> ChatlineResult<Message> {
        self.request(|reply| Command::Discard {
            local_id,
            reply: Some(reply),
        })
        .await
    }

    pub async fn set_viewport(&self, metrics: ViewportMetrics) -> ChatlineResult<()> {
        self.send_command(Command::SetViewport { metrics }).await
    }

    pub async fn snapshot(&self) -> ChatlineResult<TimelineSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send_command(Command::Snapshot { reply }).await?;
        response.await.map_err(|_| self.closed())
    }

    pub async fn shutdown(&self) -> ChatlineResult<()> {
        self.send_command(Command::Shutdown).await
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<ChatlineResult<R>>) -> Command,
    ) -> ChatlineResult<R> {
        let (reply, response) = oneshot::channel();
        self.send_command(build(reply)).await?;
        response.await.map_err(|_| self.closed())?
    }

    fn closed(&self) -> ChatlineError {
        ChatlineError::channel_error(format!("Conversation {} is closed", self.conversation))
    }
}
