//! # Payload abstraction shared by events and actions.
//!
//! The engine is generic over [`Message`]; [`Event`](crate::Event) and
//! [`Action`](crate::Action) are the two vocabularies that implement it.
//! They differ only in naming and in the heartbeat marker they use.
//!
//! ## Reserved identity
//! Heartbeats are synthesized with source id [`HEARTBEAT_SOURCE_ID`] and the
//! payload's [`Message::HEARTBEAT_NAME`]. The in-memory catalog refuses to
//! register that source id, so no user type can collide with a heartbeat.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Source id carried by every synthesized heartbeat.
pub const HEARTBEAT_SOURCE_ID: &str = "message-bus";

/// A single `name = value` pair carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    /// Property name, matching a [`PropertyType`](crate::PropertyType) of the message type.
    pub name: String,
    /// Property value.
    pub value: String,
}

impl Property {
    /// Creates a property.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Payload routed by an [`Engine`](crate::Engine).
///
/// Messages are immutable once published: the dispatcher clones them per
/// subscriber and never mutates them.
pub trait Message: Clone + Send + Sync + 'static {
    /// Vocabulary label used in errors and logs (`"event"`, `"action"`).
    const KIND: &'static str;

    /// Name of the heartbeat marker for this vocabulary.
    const HEARTBEAT_NAME: &'static str;

    /// Identifier of the producer that owns this message type.
    fn source_id(&self) -> &str;

    /// Message type name within its source.
    fn name(&self) -> &str;

    /// Unix timestamp in seconds (`0` = not set yet).
    fn timestamp(&self) -> i64;

    /// Overwrites the timestamp.
    fn set_timestamp(&mut self, timestamp: i64);

    /// Ordered property list.
    fn properties(&self) -> &[Property];

    /// Builds a heartbeat with the reserved identity and no properties.
    fn heartbeat(timestamp: i64) -> Self;

    /// Returns true if this message carries the reserved heartbeat identity.
    fn is_heartbeat(&self) -> bool {
        self.source_id() == HEARTBEAT_SOURCE_ID && self.name() == Self::HEARTBEAT_NAME
    }
}

/// Fills the timestamp with the current time if the producer left it at zero.
pub(crate) fn stamp<M: Message>(msg: &mut M) {
    if msg.timestamp() == 0 {
        msg.set_timestamp(unix_now());
    }
}

/// Current wall-clock time in unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
