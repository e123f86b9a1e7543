//! # Dispatch counters.
//!
//! Dropped messages are not errors; these counters are the only place they show up.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of an engine's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Messages accepted into the intake queue.
    pub published: u64,
    /// Messages dropped at publish time because the intake queue was full.
    pub intake_dropped: u64,
    /// Messages (heartbeats included) placed into a subscriber's slot.
    pub delivered: u64,
    /// Messages dropped for a subscriber whose slot was occupied.
    pub dropped: u64,
    /// Heartbeats synthesized.
    pub heartbeats: u64,
    /// Subscriptions removed because their endpoint was dropped.
    pub pruned: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    published: AtomicU64,
    intake_dropped: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    heartbeats: AtomicU64,
    pruned: AtomicU64,
}

impl Counters {
    #[inline]
    pub(crate) fn published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn intake_dropped(&self) {
        self.intake_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn delivered(&self, n: u64) {
        self.delivered.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn pruned(&self, n: u64) {
        self.pruned.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            published: self.published.load(Ordering::Relaxed),
            intake_dropped: self.intake_dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}
