//! # Subscriber side of a delivery channel.
//!
//! Provides [`Subscription`] the private receive endpoint returned by
//! [`Engine::subscribe`](crate::Engine::subscribe), and [`SubscriberId`] the
//! identity the registry uses to find it again on unsubscribe.
//!
//! ## Rules
//! - Capacity is exactly [`DELIVERY_CAPACITY`]: one message may wait unread,
//!   anything the dispatcher offers beyond that is dropped for this subscriber only.
//! - One subscription may be registered under several names of the same source
//!   and receives all of them (plus heartbeats) on the same endpoint.
//! - After engine shutdown every read observes closed: a message still sitting
//!   in the slot is discarded, never handed out. Reads never hang on a stopped engine.
//! - Dropping the subscription is enough to leave: the dispatcher prunes it on
//!   the next delivery attempt.
//!
//! ## Example
//! ```rust
//! # async fn demo(engine: &messagebus::EventService) -> Result<(), messagebus::BusError> {
//! use futures::StreamExt;
//!
//! let mut sub = engine.subscribe("Foo", &["Bar"])?;
//! while let Some(ev) = sub.next().await {
//!     println!("{} {}", ev.name, ev.timestamp);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DELIVERY_CAPACITY;

/// Global counter for subscriber identities.
static SUBSCRIBER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(SUBSCRIBER_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of a non-blocking read that produced no message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// Nothing is pending right now.
    #[error("no message pending")]
    Empty,
    /// The engine closed the channel and nothing is left to read.
    #[error("delivery channel closed")]
    Closed,
}

/// Private receive endpoint for one subscription.
pub struct Subscription<M> {
    id: SubscriberId,
    source_id: String,
    names: Vec<String>,
    rx: mpsc::Receiver<M>,
    stopped: CancellationToken,
}

impl<M> Subscription<M> {
    /// Allocates a fresh delivery channel; the sender half goes into the registry.
    pub(crate) fn channel(source_id: &str, names: Vec<String>) -> (mpsc::Sender<M>, Self) {
        let (tx, rx) = mpsc::channel(DELIVERY_CAPACITY);
        let sub = Self {
            id: SubscriberId::next(),
            source_id: source_id.to_string(),
            names,
            rx,
            stopped: CancellationToken::new(),
        };
        (tx, sub)
    }

    /// Identity used by [`Engine::unsubscribe`](crate::Engine::unsubscribe).
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Source id this subscription was made for.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Names the subscription was registered under at subscribe time (after expansion).
    ///
    /// Not updated by [`Engine::unsubscribe`](crate::Engine::unsubscribe): a name
    /// removed there is still listed here.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Waits for the next message; `None` once the engine stopped.
    pub async fn recv(&mut self) -> Option<M> {
        if self.discard_if_stopped() {
            return None;
        }
        let msg = self.rx.recv().await?;
        if self.discard_if_stopped() {
            return None;
        }
        Some(msg)
    }

    /// Reads a pending message without waiting.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        if self.discard_if_stopped() {
            return Err(TryRecvError::Closed);
        }
        self.rx.try_recv().map_err(|e| match e {
            mpsc::error::TryRecvError::Empty => TryRecvError::Empty,
            mpsc::error::TryRecvError::Disconnected => TryRecvError::Closed,
        })
    }

    /// Returns true once the engine stopped or dropped its side.
    pub fn is_closed(&self) -> bool {
        self.stopped.is_cancelled() || self.rx.is_closed()
    }

    /// Handle the engine cancels at teardown.
    pub(crate) fn stop_signal(&self) -> CancellationToken {
        self.stopped.clone()
    }

    /// After teardown: close the receiver and discard the (at most one) pending item.
    fn discard_if_stopped(&mut self) -> bool {
        if !self.stopped.is_cancelled() {
            return false;
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        true
    }
}

impl<M> From<&Subscription<M>> for SubscriberId {
    fn from(sub: &Subscription<M>) -> Self {
        sub.id
    }
}

impl<M> Stream for Subscription<M> {
    type Item = M;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<M>> {
        if self.discard_if_stopped() {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(_)) if self.discard_if_stopped() => Poll::Ready(None),
            other => other,
        }
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("source_id", &self.source_id)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_ids_are_unique() {
        let (_tx1, a) = Subscription::<u8>::channel("Foo", vec!["Bar".into()]);
        let (_tx2, b) = Subscription::<u8>::channel("Foo", vec!["Bar".into()]);
        assert_ne!(a.id(), b.id());
        assert_eq!(SubscriberId::from(&a), a.id());
        assert!(a.id().to_string().starts_with("sub-"));
    }

    #[test]
    fn test_capacity_is_one_slot() {
        let (tx, mut sub) = Subscription::<u8>::channel("Foo", vec!["Bar".into()]);

        assert!(tx.try_send(1).is_ok());
        assert!(matches!(tx.try_send(2), Err(mpsc::error::TrySendError::Full(2))));

        assert_eq!(sub.try_recv(), Ok(1));
        assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_stop_discards_pending_message() {
        let (tx, mut sub) = Subscription::<u8>::channel("Foo", vec!["Bar".into()]);
        tx.try_send(9).unwrap();
        sub.stop_signal().cancel();
        drop(tx);

        assert!(sub.is_closed());
        assert_eq!(sub.next().await, None);
        assert_eq!(sub.recv().await, None);
        assert_eq!(sub.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn test_try_recv_after_stop_is_closed_even_with_live_sender() {
        let (tx, mut sub) = Subscription::<u8>::channel("Foo", vec!["Bar".into()]);
        tx.try_send(1).unwrap();
        sub.stop_signal().cancel();

        assert_eq!(sub.try_recv(), Err(TryRecvError::Closed));
        assert!(matches!(tx.try_send(2), Err(mpsc::error::TrySendError::Closed(2))));
    }

    #[tokio::test]
    async fn test_dropped_sender_without_stop_keeps_buffered_message() {
        let (tx, mut sub) = Subscription::<u8>::channel("Foo", vec!["Bar".into()]);
        tx.try_send(5).unwrap();
        drop(tx);

        assert_eq!(sub.recv().await, Some(5));
        assert_eq!(sub.recv().await, None);
    }
}
