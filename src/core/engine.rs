//! # Engine: lifecycle owner and public API of one broadcast instance.
//!
//! The [`Engine`] owns the subscriber registry, the intake queue and the
//! lifecycle state. [`Engine::start`] runs the dispatcher on the caller's task
//! for the engine's whole lifetime; every other operation is synchronous and
//! may be called from any task.
//!
//! ## Lifecycle
//! ```text
//! NotStarted ──start(token)──► Running ──token.cancel()──► Stopped (terminal)
//!
//! start():   install registry, open intake, state=Running, run dispatcher
//! teardown:  state=Stopped, drop intake, uninstall registry, close every delivery channel
//! ```
//!
//! ## Operation matrix
//! | operation     | NotStarted               | Running            | Stopped                  |
//! |---------------|--------------------------|--------------------|--------------------------|
//! | `publish`     | `EngineNotStarted`       | never waits        | `EngineStopped`          |
//! | `subscribe`   | `EngineNotStarted`       | validate, register | `EngineStopped`          |
//! | `unsubscribe` | `RegistryNotInitialized` | remove by identity | `RegistryNotInitialized` |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use messagebus::{Config, Event, EventService, TypeDescriptor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(EventService::in_memory(Config::default()));
//!     engine.register_type(TypeDescriptor::new("Foo", "Bar").with_property_type("P"))?;
//!
//!     let token = CancellationToken::new();
//!     let runner = tokio::spawn({
//!         let engine = Arc::clone(&engine);
//!         let token = token.clone();
//!         async move { engine.start(token).await }
//!     });
//!     engine.wait_until_running().await?;
//!
//!     let mut sub = engine.subscribe("Foo", &["Bar"])?;
//!     engine.publish(Event::new("Foo", "Bar").with_property("P", "V"))?;
//!     let ev = sub.recv().await.expect("delivered");
//!     assert_eq!(ev.properties[0].value, "V");
//!
//!     token.cancel();
//!     runner.await??;
//!     assert!(sub.recv().await.is_none());
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::catalog::{InMemoryCatalog, TypeCatalog, TypeDescriptor};
use crate::config::Config;
use crate::error::{BusError, CatalogError, ValidationError};
use crate::messages::{Action, Event, Message, stamp};
use crate::subscribers::{SubscriberId, Subscription};

use super::dispatcher::Dispatcher;
use super::registry::{Subscriber, SubscriberRegistry};
use super::stats::{Counters, Stats};

/// Engine routing [`Event`]s.
pub type EventService = Engine<Event>;
/// Engine routing [`Action`]s.
pub type ActionService = Engine<Action>;

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, `start` not called yet.
    NotStarted,
    /// Dispatcher loop running.
    Running,
    /// Torn down; terminal.
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineState::NotStarted => "not_started",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
        })
    }
}

/// Publisher side of the intake, present only while running.
struct Intake<M> {
    tx: mpsc::Sender<M>,
    token: CancellationToken,
}

/// Publish/subscribe broadcast engine for one payload vocabulary.
pub struct Engine<M: Message> {
    cfg: Config,
    catalog: Arc<dyn TypeCatalog>,
    registry: SubscriberRegistry<M>,
    counters: Counters,
    state: watch::Sender<EngineState>,
    intake: Mutex<Option<Intake<M>>>,
}

impl<M: Message> Engine<M> {
    /// Creates an engine that validates against `catalog`.
    pub fn new(catalog: Arc<dyn TypeCatalog>, cfg: Config) -> Self {
        let (state, _) = watch::channel(EngineState::NotStarted);
        Self {
            cfg,
            catalog,
            registry: SubscriberRegistry::new(),
            counters: Counters::default(),
            state,
            intake: Mutex::new(None),
        }
    }

    /// Creates an engine backed by a fresh [`InMemoryCatalog`].
    pub fn in_memory(cfg: Config) -> Self {
        Self::new(Arc::new(InMemoryCatalog::new()), cfg)
    }

    /// Engine configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Type catalog consulted by subscribe (and publish, if configured).
    pub fn catalog(&self) -> &Arc<dyn TypeCatalog> {
        &self.catalog
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Waits until [`start`](Self::start) has installed the engine.
    ///
    /// Returns `EngineStopped` if the engine was already torn down.
    pub async fn wait_until_running(&self) -> Result<(), BusError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| *s != EngineState::NotStarted)
            .await
            .map(|s| *s)
            .unwrap_or(EngineState::Stopped);

        match state {
            EngineState::Running => Ok(()),
            _ => Err(BusError::EngineStopped),
        }
    }

    /// Waits until teardown has completed.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s == EngineState::Stopped).await;
    }

    /// Snapshot of the dispatch counters.
    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }

    /// Number of distinct live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }

    /// Runs the engine until `token` is cancelled.
    ///
    /// This is the engine's main loop: it does not return while the engine runs.
    /// Teardown happens when it returns **or** when the future is dropped.
    ///
    /// Fails with `AlreadyStarted` if the engine is running or has stopped.
    pub async fn start(&self, token: CancellationToken) -> Result<(), BusError> {
        let intake = self.begin(token.clone())?;
        let _teardown = Teardown(self);

        let period = self.cfg.heartbeat_interval_clamped();
        tracing::info!(
            kind = M::KIND,
            heartbeat = ?period,
            intake_capacity = self.cfg.intake_capacity_clamped(),
            "engine started"
        );

        let reason = Dispatcher::new(&self.registry, &self.counters, period)
            .run(intake, token)
            .await;
        tracing::debug!(kind = M::KIND, ?reason, "dispatcher loop exited");
        Ok(())
    }

    /// Hands `msg` to the dispatcher without waiting.
    ///
    /// Fills the timestamp if it is zero. If the dispatcher cannot take the
    /// message right now it is dropped and the call still succeeds: the
    /// returned message is what was attempted, not a delivery receipt.
    pub fn publish(&self, mut msg: M) -> Result<M, BusError> {
        self.ensure_running()?;
        stamp(&mut msg);

        if self.cfg.validate_on_publish {
            if let Err(err) = self.validate_message(&msg) {
                tracing::warn!(
                    kind = M::KIND,
                    source_id = msg.source_id(),
                    name = msg.name(),
                    error = %err,
                    "publish rejected"
                );
                return Err(err.into());
            }
        }

        let guard = self.lock_intake();
        let Some(intake) = guard.as_ref() else {
            return Err(self.lifecycle_error());
        };
        if intake.token.is_cancelled() {
            return Err(BusError::EngineStopped);
        }

        match intake.tx.try_send(msg.clone()) {
            Ok(()) => self.counters.published(),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.intake_dropped();
                tracing::debug!(
                    kind = M::KIND,
                    source_id = msg.source_id(),
                    name = msg.name(),
                    "dispatcher busy, dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(BusError::EngineStopped),
        }
        Ok(msg)
    }

    /// Same operation as [`publish`](Self::publish), in action vocabulary.
    #[inline]
    pub fn trigger(&self, msg: M) -> Result<M, BusError> {
        self.publish(msg)
    }

    /// Opens a delivery channel for `names` of `source_id`.
    ///
    /// An empty `names` subscribes to every type the catalog has for the
    /// source. If the source has no registered types that is an error
    /// (`NoRegisteredTypes`), not a subscription that could only ever see
    /// heartbeats. Validation is all-or-nothing: on error nothing is registered.
    pub fn subscribe<S: AsRef<str>>(
        &self,
        source_id: &str,
        names: &[S],
    ) -> Result<Subscription<M>, BusError> {
        self.ensure_running()?;
        let names = self.resolve_names(source_id, names)?;

        let (tx, sub) = Subscription::channel(source_id, names.clone());
        match self
            .registry
            .add_subscription(source_id, &names, Subscriber::new(&sub, tx))
        {
            Ok(()) => {}
            Err(BusError::RegistryNotInitialized) => return Err(self.lifecycle_error()),
            Err(err) => return Err(err),
        }

        tracing::debug!(
            kind = M::KIND,
            subscriber = %sub.id(),
            source_id,
            names = ?names,
            "subscribed"
        );
        Ok(sub)
    }

    /// Removes a subscription from one `(source_id, name)` key.
    ///
    /// Removing a subscription that is not registered under an existing key
    /// is a successful no-op. Other keys the subscription sits under are unaffected.
    pub fn unsubscribe(
        &self,
        source_id: &str,
        name: &str,
        sub: impl Into<SubscriberId>,
    ) -> Result<(), BusError> {
        let id = sub.into();
        if self.registry.remove_subscription(source_id, name, id)? {
            tracing::debug!(kind = M::KIND, subscriber = %id, source_id, name, "unsubscribed");
        }
        Ok(())
    }

    /// Registers (or replaces) a type in the catalog.
    pub fn register_type(&self, descriptor: TypeDescriptor) -> Result<TypeDescriptor, CatalogError> {
        self.catalog.register_type(descriptor)
    }

    /// Lists every registered type.
    pub fn get_types(&self) -> Result<Vec<TypeDescriptor>, CatalogError> {
        self.catalog.get_types()
    }

    /// Lists the types registered under `source_id`.
    pub fn get_types_by_source(&self, source_id: &str) -> Result<Vec<TypeDescriptor>, CatalogError> {
        self.catalog.get_types_by_source(source_id)
    }

    /// Looks up one type.
    pub fn get_type(&self, source_id: &str, name: &str) -> Result<Option<TypeDescriptor>, CatalogError> {
        self.catalog.get_type(source_id, name)
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn lock_intake(&self) -> MutexGuard<'_, Option<Intake<M>>> {
        self.intake.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// NotStarted → Running; the intake lock serializes this with teardown.
    fn begin(&self, token: CancellationToken) -> Result<mpsc::Receiver<M>, BusError> {
        let mut intake = self.lock_intake();
        if self.state() != EngineState::NotStarted {
            return Err(BusError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel(self.cfg.intake_capacity_clamped());
        self.registry.install();
        *intake = Some(Intake { tx, token });
        self.state.send_replace(EngineState::Running);
        Ok(rx)
    }

    /// Running → Stopped. Runs at most once.
    fn teardown(&self) {
        let released = {
            let mut intake = self.lock_intake();
            if self.state() == EngineState::Stopped {
                return;
            }
            self.state.send_replace(EngineState::Stopped);
            intake.take()
        };
        drop(released);

        let subscribers = self.registry.clear();
        let closed = subscribers.len();
        drop(subscribers);

        tracing::info!(kind = M::KIND, subscribers = closed, "engine stopped");
    }

    fn ensure_running(&self) -> Result<(), BusError> {
        match self.state() {
            EngineState::Running => Ok(()),
            EngineState::NotStarted => Err(BusError::EngineNotStarted),
            EngineState::Stopped => Err(BusError::EngineStopped),
        }
    }

    fn lifecycle_error(&self) -> BusError {
        match self.state() {
            EngineState::NotStarted => BusError::EngineNotStarted,
            _ => BusError::EngineStopped,
        }
    }

    fn lookup_type(&self, source_id: &str, name: &str) -> Result<TypeDescriptor, ValidationError> {
        match self.catalog.get_type(source_id, name) {
            Ok(Some(descriptor)) => Ok(descriptor),
            Ok(None) => Err(ValidationError::NameNotFound {
                kind: M::KIND,
                source_id: source_id.to_string(),
                name: name.to_string(),
            }),
            Err(source) => Err(ValidationError::Catalog {
                source_id: source_id.to_string(),
                name: name.to_string(),
                source,
            }),
        }
    }

    /// Expands an empty list, drops duplicates, validates every name.
    fn resolve_names<S: AsRef<str>>(
        &self,
        source_id: &str,
        names: &[S],
    ) -> Result<Vec<String>, ValidationError> {
        let requested: Vec<String> = if names.is_empty() {
            self.catalog
                .get_types_by_source(source_id)
                .map_err(|source| ValidationError::Catalog {
                    source_id: source_id.to_string(),
                    name: "*".to_string(),
                    source,
                })?
                .into_iter()
                .map(|t| t.name)
                .collect()
        } else {
            names.iter().map(|n| n.as_ref().to_string()).collect()
        };

        let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if resolved.contains(&name) {
                continue;
            }
            self.lookup_type(source_id, &name)?;
            resolved.push(name);
        }

        if resolved.is_empty() {
            return Err(ValidationError::NoRegisteredTypes {
                source_id: source_id.to_string(),
            });
        }
        Ok(resolved)
    }

    fn validate_message(&self, msg: &M) -> Result<(), ValidationError> {
        self.lookup_type(msg.source_id(), msg.name())?
            .check_properties(msg)
    }
}

/// Runs teardown when `start` returns or its future is dropped.
struct Teardown<'a, M: Message>(&'a Engine<M>);

impl<M: Message> Drop for Teardown<'_, M> {
    fn drop(&mut self) {
        self.0.teardown();
    }
}
