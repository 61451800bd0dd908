//! Periodic live statistics.
//!
//! The reporter reads counters only and never touches machine or yard
//! state.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use yardwatch_link::StatsSnapshot;

/// One periodic progress line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    /// Messages consumed so far.
    pub consumed: u64,
    /// Messages delivered by the link so far.
    pub delivered: u64,
    /// Consumed messages per second since the run started.
    pub throughput_per_sec: f64,
    /// Machines currently inside a yard.
    pub active_machines: usize,
    /// Delivered share of generated messages, in percent.
    pub reliability_percent: f64,
    /// Seconds since the run started.
    pub elapsed_seconds: f64,
}

impl LiveSnapshot {
    /// Derives a snapshot from counters and elapsed time.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_stats(stats: &StatsSnapshot, elapsed: Duration) -> Self {
        let elapsed_seconds = elapsed.as_secs_f64();
        let throughput_per_sec = if elapsed_seconds > 0.0 {
            stats.consumed as f64 / elapsed_seconds
        } else {
            0.0
        };
        Self {
            consumed: stats.consumed,
            delivered: stats.delivered,
            throughput_per_sec,
            active_machines: stats.active_machines,
            reliability_percent: stats.reliability_percent(),
            elapsed_seconds,
        }
    }
}

/// Decides when to report and logs the report.
#[derive(Debug, Clone, Copy)]
pub struct LiveReporter {
    every: u64,
    started: Instant,
}

impl LiveReporter {
    /// Reports every `every` consumed messages, timing from `started`.
    pub const fn new(every: u64, started: Instant) -> Self {
        Self { every, started }
    }

    /// Returns true if the `consumed`-th message should trigger a report.
    pub const fn is_due(&self, consumed: u64) -> bool {
        self.every > 0 && consumed > 0 && consumed % self.every == 0
    }

    /// Builds and logs a snapshot.
    pub fn report(&self, stats: &StatsSnapshot) -> LiveSnapshot {
        let snapshot = LiveSnapshot::from_stats(stats, self.started.elapsed());
        info!(
            consumed = snapshot.consumed,
            delivered = snapshot.delivered,
            throughput = format_args!("{:.2}/s", snapshot.throughput_per_sec),
            active_machines = snapshot.active_machines,
            reliability = format_args!("{:.1}%", snapshot.reliability_percent),
            "progress"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_rates() {
        let stats = StatsSnapshot {
            generated: 10,
            delivered: 9,
            consumed: 8,
            active_machines: 3,
            ..StatsSnapshot::default()
        };
        let snapshot = LiveSnapshot::from_stats(&stats, Duration::from_secs(4));
        assert!((snapshot.throughput_per_sec - 2.0).abs() < f64::EPSILON);
        assert!((snapshot.reliability_percent - 90.0).abs() < 1e-9);
        assert_eq!(snapshot.active_machines, 3);
        assert_eq!(snapshot.consumed, 8);
    }

    #[test]
    fn zero_elapsed_has_zero_throughput() {
        let snapshot = LiveSnapshot::from_stats(&StatsSnapshot::default(), Duration::ZERO);
        assert!(snapshot.throughput_per_sec.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_on_multiples() {
        let reporter = LiveReporter::new(5, Instant::now());
        let due: Vec<u64> = (0..=20).filter(|&n| reporter.is_due(n)).collect();
        assert_eq!(due, vec![5, 10, 15, 20]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = reporter.report(&StatsSnapshot {
            consumed: 5,
            ..StatsSnapshot::default()
        });
        assert!((snapshot.elapsed_seconds - 10.0).abs() < 1e-6);
        assert!((snapshot.throughput_per_sec - 0.5).abs() < 1e-6);
    }
}
