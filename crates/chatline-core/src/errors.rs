//! Error types for the Chatline pipeline
//!
//! Normalization, reconciliation and grouping are total: they never fail on
//! well-typed input. The errors here cover the boundary (payloads that cannot be
//! attributed to a sender), illegal state transitions requested by
//! collaborators, and task plumbing.

use crate::message::{DeliveryState, LocalId};
use crate::payload::PayloadSource;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Raw payloads that cannot be turned into a message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Payload has no recoverable sender")]
    MissingSender,
    #[error("Payload names neither sender nor receiver")]
    MissingParticipants,
    #[error("Payload for {sender}→{receiver} does not belong to conversation {conversation}")]
    ForeignConversation {
        sender: String,
        receiver: String,
        conversation: String,
    },
    #[error("Payload could not be decoded: {reason}")]
    Undecodable { reason: String },
    /// Unsent messages enter through `append_local`, which hands them to the sender
    #[error("{origin} payload carries an unsent message")]
    Unsent { origin: PayloadSource },
}

/// Requested lifecycle transitions that the message state machine forbids
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("No pending message with local id {local_id}")]
    UnknownLocalId { local_id: LocalId },
    #[error("Cannot {action} message {local_id} while it is {state:?}")]
    InvalidTransition {
        local_id: LocalId,
        state: DeliveryState,
        action: &'static str,
    },
}

// ----------------------------------------------------------------------------
// Umbrella Error
// ----------------------------------------------------------------------------

/// Core error type for Chatline
#[derive(Debug, thiserror::Error)]
pub enum ChatlineError {
    #[error("Malformed payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateTransitionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel communication error between tasks
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ChatlineError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        ChatlineError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        ChatlineError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an unknown local id error
    pub fn unknown_local_id(local_id: LocalId) -> Self {
        ChatlineError::StateTransition(StateTransitionError::UnknownLocalId { local_id })
    }

    /// Create an invalid transition error
    pub fn invalid_transition(local_id: LocalId, state: DeliveryState, action: &'static str) -> Self {
        ChatlineError::StateTransition(StateTransitionError::InvalidTransition {
            local_id,
            state,
            action,
        })
    }

    /// Whether the error only concerns one payload or message and the
    /// conversation can keep processing
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ChatlineError::Channel { .. } | ChatlineError::Configuration { .. }
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ChatlineError>;
pub type ChatlineResult<T> = Result<T>;
