//! Core types for Chatline conversations
//!
//! This module defines the fundamental identifiers and time primitives used
//! throughout the pipeline, using newtype patterns for type safety.

use core::fmt;
use core::ops::{Add, Deref, Sub};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// User Identifier
// ----------------------------------------------------------------------------

/// Identifier of a conversation participant as assigned by the server
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl FromStr for UserId {
    type Err = crate::ChatlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::ChatlineError::config_error("User id must not be empty"));
        }
        Ok(Self::new(trimmed))
    }
}

impl Deref for UserId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ----------------------------------------------------------------------------
// Conversation Identifier
// ----------------------------------------------------------------------------

/// Identifier for the conversation between two participants
///
/// The pair is stored in sorted order so both sides derive the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId {
    first: UserId,
    second: UserId,
}

impl ConversationId {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn involves(&self, user: &UserId) -> bool {
        &self.first == user || &self.second == user
    }

    /// Whether a sender/receiver pair belongs to this conversation
    pub fn matches_pair(&self, sender: &UserId, receiver: &UserId) -> bool {
        (sender == &self.first && receiver == &self.second)
            || (sender == &self.second && receiver == &self.first)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}↔{}", self.first, self.second)
    }
}

/// The two participants of a conversation as seen from the local device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participants {
    /// The user operating this device
    pub local: UserId,
    /// The other side of the conversation
    pub counterpart: UserId,
}

impl Participants {
    pub fn new(local: impl Into<UserId>, counterpart: impl Into<UserId>) -> Self {
        Self {
            local: local.into(),
            counterpart: counterpart.into(),
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::new(self.local.clone(), self.counterpart.clone())
    }

    /// The participant opposite `user`, if `user` takes part in this conversation
    pub fn other_side(&self, user: &UserId) -> Option<&UserId> {
        if user == &self.local {
            Some(&self.counterpart)
        } else if user == &self.counterpart {
            Some(&self.local)
        } else {
            None
        }
    }

    pub fn is_local(&self, user: &UserId) -> bool {
        user == &self.local
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Values below this are taken to be seconds rather than milliseconds
const SECONDS_THRESHOLD: u64 = 1_000_000_000_000;

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, millis: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(millis))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    /// Create a new timestamp
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Interpret a producer-supplied epoch value, scaling seconds to milliseconds
    pub fn from_epoch_value(value: u64) -> Self {
        if value < SECONDS_THRESHOLD {
            Self(value.saturating_mul(1_000))
        } else {
            Self(value)
        }
    }

    /// Get current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add seconds to this timestamp
    pub fn add_seconds(&self, seconds: u64) -> Self {
        Self(self.0.saturating_add(seconds.saturating_mul(1000)))
    }

    /// Absolute distance between two timestamps in milliseconds
    pub fn abs_diff(&self, other: Self) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Get duration since another timestamp
    pub fn duration_since(&self, other: Self) -> core::time::Duration {
        core::time::Duration::from_millis(self.0.saturating_sub(other.0))
    }

    /// Convert to a UTC date-time for calendar computations
    pub fn to_utc(&self) -> chrono::DateTime<chrono::Utc> {
        let millis = i64::try_from(self.0).unwrap_or(i64::MAX);
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_utc().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Source of "now" for the pipeline
///
/// Normalization falls back to the current time when a payload carries no
/// timestamp, and stale-pending queries measure against it. Tests inject a
/// controllable implementation.
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_ordering() {
        let a = UserId::from("alice");
        let b = UserId::from("bob");

        assert_eq!(
            ConversationId::new(a.clone(), b.clone()),
            ConversationId::new(b.clone(), a.clone())
        );
        assert!(ConversationId::new(a.clone(), b.clone()).matches_pair(&b, &a));
        assert!(!ConversationId::new(a.clone(), b).matches_pair(&a, &UserId::from("carol")));
    }

    #[test]
    fn test_participants_other_side() {
        let participants = Participants::new("alice", "bob");
        assert_eq!(
            participants.other_side(&UserId::from("alice")),
            Some(&UserId::from("bob"))
        );
        assert_eq!(participants.other_side(&UserId::from("carol")), None);
    }

    #[test]
    fn test_epoch_value_scaling() {
        assert_eq!(Timestamp::from_epoch_value(1_704_099_600).as_millis(), 1_704_099_600_000);
        assert_eq!(
            Timestamp::from_epoch_value(1_704_099_600_000).as_millis(),
            1_704_099_600_000
        );
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t0 = Timestamp::new(10_000);
        assert_eq!((t0 + 500).as_millis(), 10_500);
        assert_eq!(t0.add_seconds(2) - t0, 2_000);
        assert_eq!(t0.abs_diff(Timestamp::new(9_000)), 1_000);
        assert_eq!(Timestamp::new(1) - Timestamp::new(5), 0);
    }

    #[test]
    fn test_user_id_parse_rejects_empty() {
        assert!("  ".parse::<UserId>().is_err());
        assert_eq!("bob".parse::<UserId>().unwrap().as_str(), "bob");
    }
}
