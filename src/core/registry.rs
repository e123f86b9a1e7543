//! # Subscriber registry - `source_id → name → [delivery sender]`.
//!
//! The registry is the only shared mutable structure of an engine. Every
//! operation takes the same mutex for its whole duration, so subscribe,
//! unsubscribe, dispatcher fan-out, heartbeat broadcast and teardown never
//! observe each other half-done. The lock is never held across an `.await`.
//!
//! ## Layout
//! ```text
//! Option<SourceMap>                      None = not installed (before start / after stop)
//!   └─ "Foo" ─► { "Bar" ─► [sub-1, sub-3],
//!                 "Baz" ─► [sub-1] }      sub-1 subscribed to both names
//! ```
//!
//! ## Rules
//! - Entries are created lazily on first subscribe for a key.
//! - Removal matches by [`SubscriberId`], never by payload.
//! - Name lists emptied by unsubscribe are kept, so repeating an unsubscribe is a no-op.
//! - `clear` uninstalls the whole map, marks every subscription stopped and
//!   hands every sender back exactly once.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::subscribers::{SubscriberId, Subscription};

/// Result of offering one message to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    /// The slot was free; the message is queued.
    Delivered,
    /// The slot is occupied; the message is dropped for this subscriber.
    Full,
    /// The subscriber dropped its endpoint.
    Closed,
}

/// Registry entry: the engine-side half of a delivery channel.
pub(crate) struct Subscriber<M> {
    pub(crate) id: SubscriberId,
    tx: mpsc::Sender<M>,
    stopped: CancellationToken,
}

impl<M> Clone for Subscriber<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<M> Subscriber<M> {
    /// Engine-side entry for `sub`, whose sender half is `tx`.
    pub(crate) fn new(sub: &Subscription<M>, tx: mpsc::Sender<M>) -> Self {
        Self {
            id: sub.id(),
            tx,
            stopped: sub.stop_signal(),
        }
    }

    /// Marks the subscription stopped; its pending item becomes unreadable.
    pub(crate) fn stop(&self) {
        self.stopped.cancel();
    }

    /// Non-blocking send.
    pub(crate) fn offer(&self, msg: M) -> Offer {
        match self.tx.try_send(msg) {
            Ok(()) => Offer::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Offer::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

type NameMap<M> = HashMap<String, Vec<Subscriber<M>>>;
type SourceMap<M> = HashMap<String, NameMap<M>>;

/// Mutex-guarded two-level subscriber map.
pub(crate) struct SubscriberRegistry<M> {
    inner: Mutex<Option<SourceMap<M>>>,
}

impl<M> SubscriberRegistry<M> {
    /// Creates an uninstalled registry.
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SourceMap<M>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs an empty map (engine start).
    pub(crate) fn install(&self) {
        let mut inner = self.lock();
        if inner.is_none() {
            *inner = Some(HashMap::new());
        }
    }

    #[cfg(test)]
    pub(crate) fn is_installed(&self) -> bool {
        self.lock().is_some()
    }

    /// Registers `sub` under every `(source_id, name)` pair, atomically.
    pub(crate) fn add_subscription(
        &self,
        source_id: &str,
        names: &[String],
        sub: Subscriber<M>,
    ) -> Result<(), BusError> {
        let mut inner = self.lock();
        let map = inner.as_mut().ok_or(BusError::RegistryNotInitialized)?;

        let by_name = map.entry(source_id.to_string()).or_default();
        for name in names {
            by_name.entry(name.clone()).or_default().push(sub.clone());
        }
        Ok(())
    }

    /// Removes `id` from `(source_id, name)`, keeping the order of the others.
    ///
    /// Returns `Ok(false)` when the key exists but `id` is not registered under it.
    pub(crate) fn remove_subscription(
        &self,
        source_id: &str,
        name: &str,
        id: SubscriberId,
    ) -> Result<bool, BusError> {
        let mut inner = self.lock();
        let map = inner.as_mut().ok_or(BusError::RegistryNotInitialized)?;

        let by_name = map
            .get_mut(source_id)
            .ok_or_else(|| BusError::UnknownSourceId {
                source_id: source_id.to_string(),
            })?;
        let subs = by_name
            .get_mut(name)
            .ok_or_else(|| BusError::UnknownName {
                source_id: source_id.to_string(),
                name: name.to_string(),
            })?;

        match subs.iter().position(|s| s.id == id) {
            Some(idx) => {
                subs.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Visits the subscribers of one key in registration order.
    ///
    /// Returns the number of subscribers visited before `f` broke out (or all of them).
    pub(crate) fn for_each_under_key<F>(&self, source_id: &str, name: &str, mut f: F) -> usize
    where
        F: FnMut(&Subscriber<M>) -> ControlFlow<()>,
    {
        let inner = self.lock();
        let Some(subs) = inner
            .as_ref()
            .and_then(|map| map.get(source_id))
            .and_then(|by_name| by_name.get(name))
        else {
            return 0;
        };

        let mut visited = 0;
        for sub in subs {
            visited += 1;
            if f(sub).is_break() {
                break;
            }
        }
        visited
    }

    /// Visits every distinct subscriber once, whatever key(s) it sits under.
    pub(crate) fn for_each_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&Subscriber<M>) -> ControlFlow<()>,
    {
        let inner = self.lock();
        let Some(map) = inner.as_ref() else {
            return 0;
        };

        let mut seen = HashSet::new();
        for sub in map.values().flat_map(|by_name| by_name.values()).flatten() {
            if !seen.insert(sub.id) {
                continue;
            }
            if f(sub).is_break() {
                break;
            }
        }
        seen.len()
    }

    /// Removes every entry of the given subscribers from all keys.
    pub(crate) fn purge(&self, ids: &[SubscriberId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let mut inner = self.lock();
        let Some(map) = inner.as_mut() else {
            return 0;
        };

        let mut removed = 0;
        for subs in map.values_mut().flat_map(|by_name| by_name.values_mut()) {
            let before = subs.len();
            subs.retain(|s| !ids.contains(&s.id));
            removed += before - subs.len();
        }
        removed
    }

    /// Number of distinct registered subscribers.
    pub(crate) fn subscriber_count(&self) -> usize {
        let inner = self.lock();
        inner
            .as_ref()
            .map(|map| {
                map.values()
                    .flat_map(|by_name| by_name.values())
                    .flatten()
                    .map(|s| s.id)
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }

    /// Uninstalls the map, stops every subscription and returns each distinct subscriber once.
    ///
    /// Stopping comes first, so a reader woken by the closing channel already
    /// sees the stop and discards what is left in the slot. Dropping the returned
    /// entries (and the duplicates dropped here) closes every delivery channel;
    /// a channel closes when its last sender goes away, so it can never be closed twice.
    pub(crate) fn clear(&self) -> Vec<Subscriber<M>> {
        let Some(map) = self.lock().take() else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        map.into_values()
            .flat_map(|by_name| by_name.into_values())
            .flatten()
            .filter(|s| seen.insert(s.id))
            .inspect(Subscriber::stop)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::Subscription;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn new_sub(registry: &SubscriberRegistry<u32>, source: &str, list: &[&str]) -> Subscription<u32> {
        let (tx, sub) = Subscription::channel(source, names(list));
        registry
            .add_subscription(source, &names(list), Subscriber::new(&sub, tx))
            .unwrap();
        sub
    }

    fn ids_under(registry: &SubscriberRegistry<u32>, source: &str, name: &str) -> Vec<SubscriberId> {
        let mut ids = Vec::new();
        registry.for_each_under_key(source, name, |s| {
            ids.push(s.id);
            ControlFlow::Continue(())
        });
        ids
    }

    #[test]
    fn test_uninstalled_registry_rejects_mutation() {
        let registry = SubscriberRegistry::<u32>::new();
        let (tx, sub) = Subscription::channel("Foo", names(&["Bar"]));

        let err = registry
            .add_subscription("Foo", &names(&["Bar"]), Subscriber::new(&sub, tx))
            .unwrap_err();
        assert!(matches!(err, BusError::RegistryNotInitialized));

        let err = registry.remove_subscription("Foo", "Bar", sub.id()).unwrap_err();
        assert!(matches!(err, BusError::RegistryNotInitialized));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[test]
    fn test_one_subscription_under_many_names() {
        let registry = SubscriberRegistry::new();
        registry.install();
        let sub = new_sub(&registry, "Foo", &["Bar", "Baz"]);

        assert_eq!(ids_under(&registry, "Foo", "Bar"), vec![sub.id()]);
        assert_eq!(ids_under(&registry, "Foo", "Baz"), vec![sub.id()]);
        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(registry.for_each_all(|_| ControlFlow::Continue(())), 1);
    }

    #[test]
    fn test_remove_preserves_order_and_other_keys() {
        let registry = SubscriberRegistry::new();
        registry.install();
        let a = new_sub(&registry, "Foo", &["Bar", "Baz"]);
        let b = new_sub(&registry, "Foo", &["Bar"]);
        let c = new_sub(&registry, "Foo", &["Bar"]);

        assert!(registry.remove_subscription("Foo", "Bar", b.id()).unwrap());
        assert_eq!(ids_under(&registry, "Foo", "Bar"), vec![a.id(), c.id()]);

        assert!(registry.remove_subscription("Foo", "Bar", a.id()).unwrap());
        assert_eq!(ids_under(&registry, "Foo", "Baz"), vec![a.id()]);
    }

    #[test]
    fn test_remove_errors_and_idempotence() {
        let registry = SubscriberRegistry::new();
        registry.install();
        let a = new_sub(&registry, "Foo", &["Bar"]);

        assert!(matches!(
            registry.remove_subscription("Nope", "Bar", a.id()),
            Err(BusError::UnknownSourceId { .. })
        ));
        assert!(matches!(
            registry.remove_subscription("Foo", "Nope", a.id()),
            Err(BusError::UnknownName { .. })
        ));

        assert!(registry.remove_subscription("Foo", "Bar", a.id()).unwrap());
        assert!(!registry.remove_subscription("Foo", "Bar", a.id()).unwrap());
    }

    #[test]
    fn test_for_each_under_key_stops_on_break() {
        let registry = SubscriberRegistry::new();
        registry.install();
        let _a = new_sub(&registry, "Foo", &["Bar"]);
        let _b = new_sub(&registry, "Foo", &["Bar"]);

        let visited = registry.for_each_under_key("Foo", "Bar", |_| ControlFlow::Break(()));
        assert_eq!(visited, 1);
        assert_eq!(registry.for_each_under_key("Foo", "Missing", |_| ControlFlow::Continue(())), 0);
    }

    #[test]
    fn test_purge_drops_all_entries_of_a_subscriber() {
        let registry = SubscriberRegistry::new();
        registry.install();
        let a = new_sub(&registry, "Foo", &["Bar", "Baz"]);
        let b = new_sub(&registry, "Foo", &["Bar"]);

        assert_eq!(registry.purge(&[a.id()]), 2);
        assert_eq!(ids_under(&registry, "Foo", "Bar"), vec![b.id()]);
        assert!(ids_under(&registry, "Foo", "Baz").is_empty());
    }

    #[tokio::test]
    async fn test_clear_closes_every_channel_once() {
        let registry = SubscriberRegistry::new();
        registry.install();
        let mut a = new_sub(&registry, "Foo", &["Bar", "Baz"]);
        let mut b = new_sub(&registry, "Other", &["Qux"]);
        registry.for_each_under_key("Foo", "Bar", |s| {
            assert_eq!(s.offer(7), Offer::Delivered);
            ControlFlow::Continue(())
        });

        let drained = registry.clear();
        assert_eq!(drained.len(), 2);
        drop(drained);

        assert!(!registry.is_installed());
        assert_eq!(a.recv().await, None);
        assert_eq!(b.recv().await, None);
        assert!(registry.clear().is_empty());
    }

    #[test]
    fn test_offer_outcomes() {
        let (tx, sub) = Subscription::<u32>::channel("Foo", names(&["Bar"]));
        let entry = Subscriber::new(&sub, tx);

        assert_eq!(entry.offer(1), Offer::Delivered);
        assert_eq!(entry.offer(2), Offer::Full);
        drop(sub);
        assert_eq!(entry.offer(3), Offer::Closed);
    }
}
