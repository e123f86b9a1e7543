//! Message payloads routed by the engine.
//!
//! ## Contents
//! - [`Message`] trait the engine is generic over
//! - [`Event`], [`Action`] the two payload vocabularies
//! - [`Property`] `name = value` pair carried by both
//! - reserved heartbeat identity ([`HEARTBEAT_SOURCE_ID`] plus a per-vocabulary name)

mod action;
mod event;
mod message;

pub use action::{ACTION_HEARTBEAT_NAME, Action};
pub use event::{EVENT_HEARTBEAT_NAME, Event};
pub use message::{HEARTBEAT_SOURCE_ID, Message, Property, unix_now};
pub(crate) use message::stamp;
