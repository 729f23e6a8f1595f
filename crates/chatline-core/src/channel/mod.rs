//! Channel Module
//!
//! Typed messages exchanged between a conversation task and its collaborators:
//! - `communication`: commands in, app events and effects out
//! - `utils`: channel aliases and constructors

pub mod communication;
pub mod utils;

pub use communication::{AppEvent, Command, Effect, Reply};

pub use crate::config::ChannelConfig;

pub use utils::{
    create_app_event_channel, create_command_channel, create_effect_channel, AppEventReceiver,
    AppEventSender, ChannelError, CommandReceiver, CommandSender, EffectReceiver, EffectSender,
    NonBlockingSend,
};
