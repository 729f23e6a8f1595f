//! Conversation Task Protocol Types
//!
//! Every mutation of a conversation flows through a [`Command`] on that
//! conversation's queue. The task answers on the optional oneshot reply and
//! publishes [`AppEvent`]s for rendering and [`Effect`]s for the send
//! collaborator.

use core::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::message::{LocalId, Message, SendFailure};
use crate::payload::{Draft, RawPayload};
use crate::scroll::ViewportMetrics;
use crate::store::{IngestOutcome, TimelineSnapshot};
use crate::timeline::DateBucket;
use crate::types::ConversationId;

/// Reply slot for a command result
pub type Reply<T> = oneshot::Sender<crate::Result<T>>;

// ----------------------------------------------------------------------------
// Command: Collaborators → Conversation Task
// ----------------------------------------------------------------------------

/// Commands processed in order by a conversation task
#[derive(Debug)]
pub enum Command {
    /// Compose surface produced a message
    AppendLocal {
        draft: Draft,
        reply: Option<Reply<Message>>,
    },
    /// Transport or send collaborator delivered a payload
    IngestRemote {
        payload: RawPayload,
        reply: Option<Reply<IngestOutcome>>,
    },
    /// A send reported an error
    MarkFailed {
        local_id: LocalId,
        failure: SendFailure,
        reply: Option<Reply<Message>>,
    },
    /// User asked to resend a failed message
    Retry {
        local_id: LocalId,
        reply: Option<Reply<Message>>,
    },
    /// User removed a failed message
    Discard {
        local_id: LocalId,
        reply: Option<Reply<Message>>,
    },
    /// Rendering layer reported new viewport geometry
    SetViewport { metrics: ViewportMetrics },
    /// Request the current grouped timeline
    Snapshot {
        reply: oneshot::Sender<TimelineSnapshot>,
    },
    /// Stop the task
    Shutdown,
}

impl Command {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::AppendLocal { .. } => "append_local",
            Command::IngestRemote { .. } => "ingest_remote",
            Command::MarkFailed { .. } => "mark_failed",
            Command::Retry { .. } => "retry",
            Command::Discard { .. } => "discard",
            Command::SetViewport { .. } => "set_viewport",
            Command::Snapshot { .. } => "snapshot",
            Command::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Effect: Conversation Task → Send Collaborator
// ----------------------------------------------------------------------------

/// External side effects requested by a conversation task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Send a pending message; the result comes back as an ack or a failure
    Transmit {
        conversation: ConversationId,
        message: Message,
    },
}

// ----------------------------------------------------------------------------
// AppEvent: Conversation Task → UI
// ----------------------------------------------------------------------------

/// State changes the rendering layer reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// The visible timeline changed
    TimelineUpdated {
        conversation: ConversationId,
        buckets: Vec<DateBucket>,
        scroll_hint: bool,
    },
    /// A send failed; the message is shown as failed
    SendFailed {
        conversation: ConversationId,
        local_id: LocalId,
        failure: SendFailure,
    },
    /// The server rejected a send because the session is no longer valid
    SessionExpired {
        conversation: ConversationId,
        local_id: LocalId,
    },
    /// The conversation task stopped
    ConversationClosed { conversation: ConversationId },
}

impl AppEvent {
    pub fn conversation(&self) -> &ConversationId {
        match self {
            AppEvent::TimelineUpdated { conversation, .. }
            | AppEvent::SendFailed { conversation, .. }
            | AppEvent::SessionExpired { conversation, .. }
            | AppEvent::ConversationClosed { conversation } => conversation,
        }
    }
}
