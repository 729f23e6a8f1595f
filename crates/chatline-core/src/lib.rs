//! Chatline Core
//!
//! Message synchronization and rendering preparation for one-to-one
//! conversations. Locally composed messages, send acknowledgments and push
//! deliveries arrive out of order and sometimes twice; this crate folds them
//! into a single ordered, deduplicated timeline per conversation, grouped by
//! day and sender, and decides whether the viewport should follow.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod attachment;
pub mod channel;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod message;
pub mod normalizer;
pub mod payload;
pub mod pending;
pub mod reconciler;
pub mod scroll;
pub mod store;
pub mod timeline;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use attachment::{classify, AttachmentKind};
pub use channel::{
    create_app_event_channel, create_command_channel, create_effect_channel, AppEvent,
    AppEventReceiver, AppEventSender, Command, CommandReceiver, CommandSender, Effect,
    EffectReceiver, EffectSender,
};
pub use config::{
    ChannelConfig, ChatlineConfig, ReconcileConfig, ScrollConfig, SharedChatlineConfig,
    TimelineConfig,
};
pub use conversation::Conversation;
pub use errors::{ChatlineError, ChatlineResult, PayloadError, Result, StateTransitionError};
pub use message::{Attachment, DeliveryState, LocalId, Message, MessageId, SendFailure};
pub use normalizer::{normalize, MessageNormalizer, Normalized};
pub use payload::{AttachmentDescriptor, Draft, PayloadSource, PushEvent, RawPayload, SendAck};
pub use pending::{PendingEntry, PendingRegistry};
pub use reconciler::{ConfirmedIds, IdentityReconciler, Reconciliation};
pub use scroll::{ScrollPolicy, ViewportMetrics};
pub use store::{ConversationStore, Disposition, IngestOutcome, StoreStats, TimelineSnapshot};
pub use timeline::{group, DateBucket, SenderRun, TimelineGrouper};
pub use types::{ConversationId, Participants, SystemTimeSource, TimeSource, Timestamp, UserId};
