//! # Consumer-facing subscription handles.
//!
//! ```text
//! Engine::subscribe(source, names) ──► registry[source][name] += Sender  (one per name)
//!                                  └─► Subscription { id, Receiver }     (returned to caller)
//!
//! Dispatcher ── try_send ──► [slot: 1] ──► Subscription::recv() / Stream::next()
//! ```

mod subscription;

pub use subscription::{SubscriberId, Subscription, TryRecvError};
