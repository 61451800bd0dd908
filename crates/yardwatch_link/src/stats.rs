//! Run-wide transmission statistics.
//!
//! One [`LinkStats`] is shared (behind an `Arc`) by the replay driver, its
//! deferred deliveries and every consumer worker. All updates are atomic
//! increments; [`LinkStats::snapshot`] reads a point-in-time copy.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Atomic counters for one run.
#[derive(Debug, Default)]
pub struct LinkStats {
    generated: AtomicU64,
    delivered: AtomicU64,
    lost: AtomicU64,
    delayed: AtomicU64,
    corrupted: AtomicU64,
    consumed: AtomicU64,
    rejected: AtomicU64,
    implausible_deltas: AtomicU64,
    active_machines: AtomicUsize,
}

impl LinkStats {
    /// Creates zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A message was taken off the dataset for transmission.
    pub fn record_generated(&self) {
        self.generated.fetch_add(1, Ordering::Relaxed);
    }

    /// A message reached the channel.
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A message never reached the channel.
    pub fn record_lost(&self) {
        self.lost.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was scheduled for deferred delivery.
    pub fn record_delayed(&self) {
        self.delayed.fetch_add(1, Ordering::Relaxed);
    }

    /// A delivered message carried corrupted coordinates.
    pub fn record_corrupted(&self) {
        self.corrupted.fetch_add(1, Ordering::Relaxed);
    }

    /// A consumer pulled a message; returns the new total.
    pub fn record_consumed(&self) -> u64 {
        self.consumed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// A consumer rejected a message during validation.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// A consumer ignored an implausible time delta.
    pub fn record_implausible_delta(&self) {
        self.implausible_deltas.fetch_add(1, Ordering::Relaxed);
    }

    /// A machine entered a yard from outside (or appeared in one).
    pub fn machine_activated(&self) {
        self.active_machines.fetch_add(1, Ordering::Relaxed);
    }

    /// A machine left every yard.
    pub fn machine_deactivated(&self) {
        // Saturate rather than wrap if calls are ever unbalanced.
        let _ = self
            .active_machines
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            generated: self.generated.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            delayed: self.delayed.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            implausible_deltas: self.implausible_deltas.load(Ordering::Relaxed),
            active_machines: self.active_machines.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Messages taken off the dataset.
    pub generated: u64,
    /// Messages that reached the channel.
    pub delivered: u64,
    /// Messages that never reached the channel.
    pub lost: u64,
    /// Messages delivered after a deferred delay.
    pub delayed: u64,
    /// Delivered messages with corrupted coordinates.
    pub corrupted: u64,
    /// Messages pulled by consumers.
    pub consumed: u64,
    /// Messages rejected by validation.
    pub rejected: u64,
    /// Time deltas ignored as implausible.
    pub implausible_deltas: u64,
    /// Machines currently inside a yard.
    pub active_machines: usize,
}

impl StatsSnapshot {
    /// Delivered share of generated messages, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reliability_percent(&self) -> f64 {
        if self.generated == 0 {
            return 0.0;
        }
        self.delivered as f64 / self.generated as f64 * 100.0
    }

    /// Corrupted share of delivered messages, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate_percent(&self) -> f64 {
        if self.delivered == 0 {
            return 0.0;
        }
        self.corrupted as f64 / self.delivered as f64 * 100.0
    }

    /// Lost share of generated messages, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn loss_percent(&self) -> f64 {
        if self.generated == 0 {
            return 0.0;
        }
        self.lost as f64 / self.generated as f64 * 100.0
    }
}
