//! # Actions: requests addressed to a source.
//!
//! Same shape as [`Event`](crate::Event); a separate type so the two engines
//! can never be fed each other's payloads.

use serde::{Deserialize, Serialize};

use super::message::{HEARTBEAT_SOURCE_ID, Message, Property};

/// Heartbeat marker name of the action engine.
pub const ACTION_HEARTBEAT_NAME: &str = "message-bus-action-heartbeat";

/// Action triggered against a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Source that owns the action type.
    pub source_id: String,
    /// Action type name within the source.
    pub name: String,
    /// Unix seconds; filled at trigger time when zero.
    #[serde(default)]
    pub timestamp: i64,
    /// Ordered property list.
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Action {
    /// Creates an action with no properties and an unset timestamp.
    pub fn new(source_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            timestamp: 0,
            properties: Vec::new(),
        }
    }

    /// Appends a property.
    #[inline]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    /// Sets an explicit timestamp (unix seconds).
    #[inline]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl Message for Action {
    const KIND: &'static str = "action";
    const HEARTBEAT_NAME: &'static str = ACTION_HEARTBEAT_NAME;

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn heartbeat(timestamp: i64) -> Self {
        Action::new(HEARTBEAT_SOURCE_ID, ACTION_HEARTBEAT_NAME).with_timestamp(timestamp)
    }
}
