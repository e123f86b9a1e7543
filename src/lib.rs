//! # messagebus
//!
//! **messagebus** is an in-process publish/subscribe broadcast engine.
//!
//! Producers publish typed messages tagged with a `(source_id, name)` pair.
//! Consumers subscribe to one or more names of a source and receive a private
//! delivery channel. A single dispatcher loop per engine moves every message
//! from the intake queue to the subscribers of its key. Delivery is lossy
//! under backpressure (at-most-once, best-effort) and nothing is persisted.
//!
//! ## Architecture
//! ```text
//!   publish() / trigger()                       subscribe(source, names)
//!          │ try_send (never waits)                   │ validate via TypeCatalog
//!          ▼                                          ▼
//! ┌─────────────────────┐              ┌──────────────────────────────────┐
//! │ intake (bounded)    │              │ SubscriberRegistry (one mutex)   │
//! └─────────┬───────────┘              │ source_id → name → [sub-1, ...]  │
//!           ▼                          └────────────────┬─────────────────┘
//! ┌──────────────────────────────────────────────────────┴─────────────────┐
//! │ Dispatcher loop (one per engine)                                        │
//! │  - intake message → every subscriber of registry[source][name]          │
//! │  - heartbeat tick → every distinct subscriber                           │
//! │  - cancellation   → exit; engine closes every delivery channel          │
//! └──────────┬──────────────────────┬──────────────────────┬───────────────┘
//!            ▼                      ▼                      ▼
//!        [slot: 1]              [slot: 1]              [slot: 1]   full slot → dropped
//!      Subscription           Subscription           Subscription
//! ```
//!
//! ### Lifecycle
//! ```text
//! NotStarted ──start(token)──► Running ──token.cancel()──► Stopped
//!
//! Running:  publish, subscribe, unsubscribe accepted
//! Stopped:  every Subscription discards its pending message and yields None
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Engines**       | Event and action broadcast with one dispatcher each.     | [`Engine`], [`EventService`], [`ActionService`] |
//! | **Messages**      | Payload vocabularies and the reserved heartbeat identity.| [`Message`], [`Event`], [`Action`]          |
//! | **Subscriptions** | Capacity-1 delivery channels, also usable as a `Stream`. | [`Subscription`], [`SubscriberId`]          |
//! | **Type catalog**  | Registered schemas every subscription is checked against.| [`TypeCatalog`], [`InMemoryCatalog`]        |
//! | **Errors**        | Typed errors with stable labels.                         | [`BusError`], [`ValidationError`]           |
//! | **Configuration** | Heartbeat period, intake capacity, publish validation.   | [`Config`]                                  |
//! | **Facade**        | Both engines under one token, OS signal handling.        | [`MessageBus`]                              |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use messagebus::{Config, Event, EventService, EventType};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(EventService::in_memory(Config::default()));
//!     engine.register_type(EventType::new("Foo", "Bar").with_property_type("P"))?;
//!
//!     // The dispatcher runs inside start(); give it its own task.
//!     let token = CancellationToken::new();
//!     let runner = tokio::spawn({
//!         let engine = Arc::clone(&engine);
//!         let token = token.clone();
//!         async move { engine.start(token).await }
//!     });
//!     engine.wait_until_running().await?;
//!
//!     let mut sub = engine.subscribe("Foo", &["Bar"])?;
//!     let sent = engine.publish(Event::new("Foo", "Bar").with_property("P", "V"))?;
//!     assert_eq!(sub.recv().await, Some(sent));
//!
//!     token.cancel();
//!     runner.await??;
//!     Ok(())
//! }
//! ```
mod bus;
mod catalog;
mod config;
mod core;
mod error;
mod messages;
mod subscribers;

// ---- Public re-exports ----

pub use bus::MessageBus;
pub use catalog::{ActionType, EventType, InMemoryCatalog, PropertyType, TypeCatalog, TypeDescriptor};
pub use config::{Config, DELIVERY_CAPACITY, MIN_HEARTBEAT_INTERVAL};
pub use core::{ActionService, Engine, EngineState, EventService, Stats};
pub use error::{BusError, CatalogError, ValidationError};
pub use messages::{
    ACTION_HEARTBEAT_NAME, Action, EVENT_HEARTBEAT_NAME, Event, HEARTBEAT_SOURCE_ID, Message,
    Property, unix_now,
};
pub use subscribers::{SubscriberId, Subscription, TryRecvError};
