//! Chatline Runtime
//!
//! Async engine around `chatline-core`:
//! - `ConversationTask`: one actor per conversation, owning its store
//! - `Supervisor`: lazily spawns tasks and routes payloads to them
//! - `OutboxDispatcher`: sends pending messages and reports the outcome
//! - `RuntimeBuilder` / `RuntimeHandle`: setup and control for hosts

pub mod builder;
pub mod logic;
pub mod outbox;
pub mod supervisor;

pub use builder::{create_test_runtime, RuntimeBuilder, RuntimeHandle};
pub use logic::{ConversationHandle, ConversationTask, TaskStats};
pub use outbox::{OutboxDispatcher, Transmitter};
pub use supervisor::Supervisor;

// Re-export core types for convenience
pub use chatline_core::{
    channel::{
        AppEvent, AppEventReceiver, AppEventSender, ChannelError, Command, CommandReceiver,
        CommandSender, Effect, EffectReceiver, EffectSender, NonBlockingSend,
    },
    ChatlineConfig, ChatlineError, ChatlineResult, ConversationId, Draft, Message, RawPayload,
    SendAck, SendFailure, UserId,
};
