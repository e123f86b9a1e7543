//! # MessageBus: the event and action engines run as one unit.
//!
//! [`MessageBus`] owns one [`EventService`] and one [`ActionService`] and drives
//! both dispatchers on the caller's task under a single cancellation token.
//!
//! ```text
//! run(token) ──► join( events.start(token), actions.start(token) )
//!
//! run_until_signal():
//!   select! {
//!     SIGINT | SIGTERM | SIGQUIT  → token.cancel() → await both teardowns
//!     run() returned early        → propagate (e.g. AlreadyStarted)
//!   }
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use messagebus::{Config, MessageBus};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), messagebus::BusError> {
//!     let bus = MessageBus::in_memory(Config::default());
//!     bus.run_until_signal().await
//! }
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{ActionService, EventService, shutdown};
use crate::error::BusError;

/// Event and action engines sharing one lifetime.
#[derive(Clone)]
pub struct MessageBus {
    events: Arc<EventService>,
    actions: Arc<ActionService>,
}

impl MessageBus {
    /// Wraps existing engines (e.g. backed by external catalogs).
    pub fn new(events: Arc<EventService>, actions: Arc<ActionService>) -> Self {
        Self { events, actions }
    }

    /// Creates both engines with their own in-memory catalogs.
    pub fn in_memory(cfg: Config) -> Self {
        Self::new(
            Arc::new(EventService::in_memory(cfg.clone())),
            Arc::new(ActionService::in_memory(cfg)),
        )
    }

    /// The event engine.
    pub fn events(&self) -> &Arc<EventService> {
        &self.events
    }

    /// The action engine.
    pub fn actions(&self) -> &Arc<ActionService> {
        &self.actions
    }

    /// Waits until both engines accept publishes and subscriptions.
    pub async fn wait_until_running(&self) -> Result<(), BusError> {
        self.events.wait_until_running().await?;
        self.actions.wait_until_running().await
    }

    /// Runs both engines until `token` is cancelled.
    ///
    /// Both engines are always driven to completion; the first error wins.
    pub async fn run(&self, token: CancellationToken) -> Result<(), BusError> {
        let (events, actions) = tokio::join!(
            stop_on_error(self.events.start(token.clone()), &token),
            stop_on_error(self.actions.start(token.clone()), &token),
        );
        events.and(actions)
    }

    /// Runs both engines until the process receives a termination signal.
    pub async fn run_until_signal(&self) -> Result<(), BusError> {
        let token = CancellationToken::new();
        let run = self.run(token.clone());
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => return res,
            sig = shutdown::wait_for_shutdown_signal() => match sig {
                Ok(name) => tracing::info!(signal = name, "shutdown requested"),
                Err(err) => tracing::error!(error = %err, "signal listener failed, stopping"),
            },
        }

        token.cancel();
        run.await
    }
}

/// An engine that fails to start must not leave its sibling running.
async fn stop_on_error<F>(start: F, token: &CancellationToken) -> Result<(), BusError>
where
    F: Future<Output = Result<(), BusError>>,
{
    let res = start.await;
    if res.is_err() {
        token.cancel();
    }
    res
}
