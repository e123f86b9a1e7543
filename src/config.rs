//! # Engine configuration.
//!
//! Provides [`Config`] centralized settings for one [`Engine`](crate::Engine).
//! The same value may be shared by both engines of a [`MessageBus`](crate::MessageBus).
//!
//! ## Sentinel values
//! - `intake_capacity = 0` → clamped to 1 (tokio has no rendezvous channel)
//! - `heartbeat_interval = 0s` → clamped to [`MIN_HEARTBEAT_INTERVAL`]

use std::time::Duration;

/// Lower bound for the heartbeat period.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Capacity of every subscriber delivery channel.
///
/// One message may be in flight without an active reader; anything beyond that
/// is dropped for that subscriber.
pub const DELIVERY_CAPACITY: usize = 1;

/// Configuration for one engine instance.
///
/// ## Field semantics
/// - `heartbeat_interval`: period of the synthesized heartbeat broadcast
/// - `intake_capacity`: buffer between publishers and the dispatcher (min 1)
/// - `validate_on_publish`: check published messages against the type catalog
#[derive(Clone, Debug)]
pub struct Config {
    /// Period between two heartbeats.
    ///
    /// The first heartbeat fires one full period after the engine starts.
    pub heartbeat_interval: Duration,

    /// Capacity of the intake queue drained by the dispatcher.
    ///
    /// Publish never waits: when the queue is full the message is dropped and
    /// publish still succeeds.
    pub intake_capacity: usize,

    /// Reject published messages whose type is unknown or whose properties
    /// do not match the registered property list.
    pub validate_on_publish: bool,
}

impl Config {
    /// Returns the intake capacity clamped to a minimum of 1.
    #[inline]
    pub fn intake_capacity_clamped(&self) -> usize {
        self.intake_capacity.max(1)
    }

    /// Returns the heartbeat period clamped to [`MIN_HEARTBEAT_INTERVAL`].
    #[inline]
    pub fn heartbeat_interval_clamped(&self) -> Duration {
        self.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `heartbeat_interval = 10s`
    /// - `intake_capacity = 16`
    /// - `validate_on_publish = false`
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            intake_capacity: 16,
            validate_on_publish: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(cfg.intake_capacity_clamped(), 16);
        assert!(!cfg.validate_on_publish);
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let cfg = Config {
            heartbeat_interval: Duration::ZERO,
            intake_capacity: 0,
            validate_on_publish: false,
        };
        assert_eq!(cfg.intake_capacity_clamped(), 1);
        assert_eq!(cfg.heartbeat_interval_clamped(), MIN_HEARTBEAT_INTERVAL);
    }
}
