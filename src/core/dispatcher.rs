//! # Dispatcher: the single loop that routes messages to subscribers.
//!
//! ## Architecture
//! ```text
//!                 ┌────────────────────────────────────────────┐
//! publish() ──►   │ intake (bounded mpsc)                      │
//!                 └──────────────┬─────────────────────────────┘
//!                                ▼
//!                  loop { select! {                      (no bias)
//!                    token.cancelled()  → exit, engine tears down
//!                    intake.recv()      → fan_out(msg)   registry[source][name]
//!                    ticker.tick()      → heartbeat()    every distinct subscriber
//!                  } }
//!                                │ try_send (never waits)
//!                 ┌──────────────┼──────────────┐
//!                 ▼              ▼              ▼
//!             [slot: 1]      [slot: 1]      [slot: 1]
//!               sub-1          sub-2          sub-N
//! ```
//!
//! ## Rules
//! - **Drop on backpressure**: a full slot drops the message for that subscriber only.
//! - **Prune**: a subscriber whose endpoint is gone is removed from every key.
//! - **Cancellation** observed during a fan-out aborts the rest of it.
//! - **Per-subscriber FIFO**: one loop drains one intake queue.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::messages::{Message, unix_now};
use crate::subscribers::SubscriberId;

use super::registry::{Offer, SubscriberRegistry};
use super::stats::Counters;

/// Why the dispatcher loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitReason {
    /// The engine token was cancelled.
    Cancelled,
    /// Every intake sender is gone.
    IntakeClosed,
}

/// Per-pass delivery tally.
#[derive(Debug, Default)]
struct Tally {
    visited: usize,
    delivered: u64,
    dropped: u64,
    closed: Vec<SubscriberId>,
}

impl Tally {
    fn record<M: Message>(&mut self, id: SubscriberId, outcome: Offer, msg: &M) {
        match outcome {
            Offer::Delivered => self.delivered += 1,
            Offer::Full => {
                self.dropped += 1;
                tracing::trace!(
                    subscriber = %id,
                    source_id = msg.source_id(),
                    name = msg.name(),
                    "subscriber slot full, dropped"
                );
            }
            Offer::Closed => self.closed.push(id),
        }
    }
}

/// Borrowed view of the engine state the loop needs.
pub(crate) struct Dispatcher<'a, M: Message> {
    registry: &'a SubscriberRegistry<M>,
    counters: &'a Counters,
    period: Duration,
}

impl<'a, M: Message> Dispatcher<'a, M> {
    pub(crate) fn new(
        registry: &'a SubscriberRegistry<M>,
        counters: &'a Counters,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            counters,
            period,
        }
    }

    /// Runs until cancellation (or until the intake closes).
    ///
    /// The intake is closed before returning, so publishers racing with
    /// shutdown observe `Closed` instead of queueing into a dead loop.
    pub(crate) async fn run(
        &self,
        mut intake: mpsc::Receiver<M>,
        token: CancellationToken,
    ) -> ExitReason {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                _ = token.cancelled() => break ExitReason::Cancelled,
                msg = intake.recv() => match msg {
                    Some(msg) => {
                        if self.fan_out(&msg, &token).is_break() {
                            break ExitReason::Cancelled;
                        }
                    }
                    None => break ExitReason::IntakeClosed,
                },
                _ = ticker.tick() => {
                    if self.heartbeat(&token).is_break() {
                        break ExitReason::Cancelled;
                    }
                }
            }
        };

        intake.close();
        reason
    }

    /// Offers `msg` to every subscriber of its `(source_id, name)` key.
    pub(crate) fn fan_out(&self, msg: &M, token: &CancellationToken) -> ControlFlow<()> {
        let mut tally = Tally::default();
        let mut cancelled = false;

        let visited = self
            .registry
            .for_each_under_key(msg.source_id(), msg.name(), |sub| {
                if token.is_cancelled() {
                    cancelled = true;
                    return ControlFlow::Break(());
                }
                tally.record(sub.id, sub.offer(msg.clone()), msg);
                ControlFlow::Continue(())
            });
        tally.visited = visited;

        if tally.visited == 0 {
            tracing::trace!(
                kind = M::KIND,
                source_id = msg.source_id(),
                name = msg.name(),
                "no subscribers, dropped"
            );
        }
        self.settle(tally);

        if cancelled {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Offers a fresh heartbeat to every distinct subscriber, whatever its key.
    pub(crate) fn heartbeat(&self, token: &CancellationToken) -> ControlFlow<()> {
        let beat = M::heartbeat(unix_now());
        let mut tally = Tally::default();
        let mut cancelled = false;

        self.counters.heartbeat();
        let visited = self.registry.for_each_all(|sub| {
            if token.is_cancelled() {
                cancelled = true;
                return ControlFlow::Break(());
            }
            tally.record(sub.id, sub.offer(beat.clone()), &beat);
            ControlFlow::Continue(())
        });
        tally.visited = visited;

        tracing::trace!(
            kind = M::KIND,
            subscribers = tally.visited,
            delivered = tally.delivered,
            "heartbeat"
        );
        self.settle(tally);

        if cancelled {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn settle(&self, tally: Tally) {
        self.counters.delivered(tally.delivered);
        self.counters.dropped(tally.dropped);

        if !tally.closed.is_empty() {
            let removed = self.registry.purge(&tally.closed);
            self.counters.pruned(tally.closed.len() as u64);
            tracing::debug!(
                kind = M::KIND,
                subscribers = tally.closed.len(),
                entries = removed,
                "pruned closed subscribers"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::Subscriber;
    use crate::messages::Event;
    use crate::subscribers::{Subscription, TryRecvError};

    fn setup() -> (SubscriberRegistry<Event>, Counters) {
        let registry = SubscriberRegistry::new();
        registry.install();
        (registry, Counters::default())
    }

    fn subscribe(registry: &SubscriberRegistry<Event>, names: &[&str]) -> Subscription<Event> {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let (tx, sub) = Subscription::channel("Foo", names.clone());
        registry
            .add_subscription("Foo", &names, Subscriber::new(&sub, tx))
            .unwrap();
        sub
    }

    #[test]
    fn test_full_slot_drops_for_that_subscriber_only() {
        let (registry, counters) = setup();
        let d = Dispatcher::new(&registry, &counters, Duration::from_secs(10));
        let token = CancellationToken::new();
        let mut slow = subscribe(&registry, &["Bar"]);
        let mut fast = subscribe(&registry, &["Bar"]);

        let _ = d.fan_out(&Event::new("Foo", "Bar").with_property("n", "1"), &token);
        assert_eq!(fast.try_recv().unwrap().properties[0].value, "1");

        let _ = d.fan_out(&Event::new("Foo", "Bar").with_property("n", "2"), &token);
        assert_eq!(fast.try_recv().unwrap().properties[0].value, "2");

        assert_eq!(slow.try_recv().unwrap().properties[0].value, "1");
        assert_eq!(slow.try_recv(), Err(TryRecvError::Empty));

        let stats = counters.snapshot();
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_no_subscribers_is_a_noop() {
        let (registry, counters) = setup();
        let d = Dispatcher::new(&registry, &counters, Duration::from_secs(10));
        let flow = d.fan_out(&Event::new("Foo", "Nobody"), &CancellationToken::new());

        assert!(flow.is_continue());
        assert_eq!(counters.snapshot(), Default::default());
    }

    #[test]
    fn test_cancelled_fan_out_delivers_nothing() {
        let (registry, counters) = setup();
        let d = Dispatcher::new(&registry, &counters, Duration::from_secs(10));
        let mut sub = subscribe(&registry, &["Bar"]);
        let token = CancellationToken::new();
        token.cancel();

        assert!(d.fan_out(&Event::new("Foo", "Bar"), &token).is_break());
        assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_heartbeat_reaches_each_subscriber_once() {
        let (registry, counters) = setup();
        let d = Dispatcher::new(&registry, &counters, Duration::from_secs(10));
        let mut multi = subscribe(&registry, &["Bar", "Baz"]);
        let mut single = subscribe(&registry, &["Baz"]);

        assert!(d.heartbeat(&CancellationToken::new()).is_continue());

        assert!(multi.try_recv().unwrap().is_heartbeat());
        assert!(single.try_recv().unwrap().is_heartbeat());

        let stats = counters.snapshot();
        assert_eq!(stats.heartbeats, 1);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_closed_subscriber_is_pruned() {
        let (registry, counters) = setup();
        let d = Dispatcher::new(&registry, &counters, Duration::from_secs(10));
        let gone = subscribe(&registry, &["Bar", "Baz"]);
        let _kept = subscribe(&registry, &["Bar"]);
        drop(gone);

        let _ = d.fan_out(&Event::new("Foo", "Bar"), &CancellationToken::new());

        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(counters.snapshot().pruned, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_cancel_and_closes_intake() {
        let (registry, counters) = setup();
        let d = Dispatcher::new(&registry, &counters, Duration::from_secs(10));
        let (tx, rx) = mpsc::channel::<Event>(4);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(25)).await;
            canceller.cancel();
        });

        assert_eq!(d.run(rx, token).await, ExitReason::Cancelled);
        assert!(tx.is_closed());
        assert_eq!(counters.snapshot().heartbeats, 2);
    }

    #[tokio::test]
    async fn test_run_exits_when_intake_closes() {
        let (registry, counters) = setup();
        let d = Dispatcher::new(&registry, &counters, Duration::from_secs(10));
        let (tx, rx) = mpsc::channel::<Event>(4);
        drop(tx);

        assert_eq!(d.run(rx, CancellationToken::new()).await, ExitReason::IntakeClosed);
    }
}
