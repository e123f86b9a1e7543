//! # Events: facts emitted by a source.
//!
//! ## Example
//! ```rust
//! use messagebus::Event;
//!
//! let ev = Event::new("Foo", "Bar")
//!     .with_property("P", "V")
//!     .with_timestamp(1_700_000_000);
//!
//! assert_eq!(ev.source_id, "Foo");
//! assert_eq!(ev.properties[0].value, "V");
//! ```

use serde::{Deserialize, Serialize};

use super::message::{HEARTBEAT_SOURCE_ID, Message, Property};

/// Heartbeat marker name of the event engine.
pub const EVENT_HEARTBEAT_NAME: &str = "message-bus-heartbeat";

/// Event published by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Producer that owns the event type.
    pub source_id: String,
    /// Event type name within the source.
    pub name: String,
    /// Unix seconds; filled at publish time when zero.
    #[serde(default)]
    pub timestamp: i64,
    /// Ordered property list.
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Event {
    /// Creates an event with no properties and an unset timestamp.
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

impl Message for Event {
    const KIND: &'static str = "event";
    const HEARTBEAT_NAME: &'static str = EVENT_HEARTBEAT_NAME;

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
        Event::new(HEARTBEAT_SOURCE_ID, EVENT_HEARTBEAT_NAME).with_timestamp(timestamp)
    }
}
