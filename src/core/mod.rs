//! Runtime core: engine lifecycle, registry and dispatch.
//!
//! The only public items are [`Engine`] (with its [`EventService`] and
//! [`ActionService`] instantiations), [`EngineState`] and [`Stats`].
//!
//! Internal modules:
//! - [`engine`]: lifecycle owner, publish/subscribe/unsubscribe entry points;
//! - [`dispatcher`]: the single loop that fans messages and heartbeats out;
//! - [`registry`]: mutex-guarded `source_id → name → subscribers` map;
//! - [`stats`]: dispatch counters;
//! - [`shutdown`]: OS termination signals.

mod dispatcher;
mod engine;
mod registry;
mod stats;

pub(crate) mod shutdown;

pub use engine::{ActionService, Engine, EngineState, EventService};
pub use stats::Stats;
