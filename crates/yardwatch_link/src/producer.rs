//! Paced replay of a recorded message set over the impaired link.
//!
//! The driver walks the dataset in timestamp order, waits one paced interval
//! per message, asks the [`ImpairmentModel`] for a verdict and hands the
//! survivors to the [`Channel`]. Deferred deliveries run as their own tasks so
//! a long delay never stalls pacing. When the dataset is exhausted (or a stop
//! is requested) the driver waits for every deferred delivery and then
//! closes the channel.

use crate::channel::Channel;
use crate::config::{LinkConfig, PacingConfig};
use crate::error::{Error, Result};
use crate::impairment::{Delivery, ImpairmentModel, Verdict};
use crate::stats::LinkStats;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use yardwatch_model::Message;

/// Cooperative stop signal for a running replay.
///
/// Stopping ends the pacing loop; deferred deliveries already scheduled still
/// complete and the channel is closed afterwards.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopSignal>,
}

#[derive(Debug, Default)]
struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopHandle {
    /// Creates an unsignalled handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the replay to stop.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns true once [`StopHandle::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

/// Outcome of one replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Messages taken off the dataset (equals `generated`).
    pub messages_replayed: u64,
    /// True if a stop was requested before the dataset was exhausted.
    pub stopped_early: bool,
    /// Wall-clock (or paused-clock) time from start to channel close.
    pub elapsed: Duration,
}

/// Replays a message set through the impairment model into a channel.
#[derive(Debug)]
pub struct ReplayDriver {
    messages: Vec<Message>,
    model: ImpairmentModel,
    pacing: PacingConfig,
    rng: ChaCha8Rng,
    stats: Arc<LinkStats>,
    stop: StopHandle,
}

impl ReplayDriver {
    /// Prepares a replay. Messages are sorted stably by timestamp, then
    /// sequence; messages without a timestamp go first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the link configuration is out of
    /// range.
    pub fn new(
        mut messages: Vec<Message>,
        config: &LinkConfig,
        stats: Arc<LinkStats>,
    ) -> Result<Self> {
        config.validate()?;
        messages.sort_by_key(|m| (m.timestamp, m.sequence));

        Ok(Self {
            messages,
            model: ImpairmentModel::new(config.impairment.clone())?,
            pacing: config.pacing.clone(),
            rng: ChaCha8Rng::seed_from_u64(config.impairment.seed),
            stats,
            stop: StopHandle::new(),
        })
    }

    /// Returns a handle that stops this replay.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Number of messages queued for replay.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there is nothing to replay.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Runs the replay to completion and closes the channel.
    pub async fn run(mut self, channel: Arc<Channel>) -> ReplaySummary {
        let started = Instant::now();
        let messages = std::mem::take(&mut self.messages);
        let mut in_flight = JoinSet::new();
        let mut replayed = 0_u64;
        let mut stopped_early = false;

        let impairment = self.model.config();
        info!(
            messages = messages.len(),
            interval_ms = self.pacing.interval().as_millis(),
            loss = impairment.loss_probability,
            error = impairment.error_probability,
            max_delay = impairment.max_delay_seconds,
            "replay started"
        );

        for (index, message) in messages.into_iter().enumerate() {
            let gap = if index == 0 {
                Duration::ZERO
            } else {
                self.next_gap()
            };

            tokio::select! {
                biased;
                () = self.stop.stopped() => {
                    stopped_early = true;
                    break;
                }
                () = tokio::time::sleep(gap) => {}
            }

            self.stats.record_generated();
            replayed += 1;

            let sequence = message.sequence;
            match self.model.decide(message, &mut self.rng) {
                Verdict::Drop => {
                    self.stats.record_lost();
                    debug!(sequence, "message lost in transit");
                }
                Verdict::Deliver(delivery) if delivery.delay.is_zero() => {
                    deliver(&channel, &self.stats, delivery).await;
                }
                Verdict::Deliver(delivery) => {
                    self.stats.record_delayed();
                    debug!(
                        sequence,
                        delay_ms = delivery.delay.as_millis(),
                        "message delayed"
                    );
                    let channel = Arc::clone(&channel);
                    let stats = Arc::clone(&self.stats);
                    in_flight.spawn(async move {
                        tokio::time::sleep(delivery.delay).await;
                        deliver(&channel, &stats, delivery).await;
                    });
                }
            }
        }

        if stopped_early {
            info!(
                replayed,
                pending = in_flight.len(),
                "replay stopped, draining deferred deliveries"
            );
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "deferred delivery task failed");
            }
        }
        channel.close();

        let summary = ReplaySummary {
            messages_replayed: replayed,
            stopped_early,
            elapsed: started.elapsed(),
        };
        info!(
            replayed = summary.messages_replayed,
            elapsed_ms = summary.elapsed.as_millis(),
            "replay finished"
        );
        summary
    }

    fn next_gap(&mut self) -> Duration {
        let base = self.pacing.interval();
        let jitter = self.pacing.jitter;
        if jitter > 0.0 {
            base.mul_f64(self.rng.gen_range((1.0 - jitter)..=(1.0 + jitter)))
        } else {
            base
        }
    }
}

async fn deliver(channel: &Channel, stats: &LinkStats, delivery: Delivery) {
    match channel.send(delivery.message).await {
        Ok(()) => {
            stats.record_delivered();
            if let Some(kind) = delivery.corruption {
                stats.record_corrupted();
                debug!(?kind, "message delivered with corrupted coordinates");
            }
        }
        Err(Error::ChannelClosed(message)) => {
            stats.record_lost();
            warn!(
                sequence = message.sequence,
                "channel closed before delivery, message lost"
            );
        }
        Err(e) => {
            stats.record_lost();
            warn!(error = %e, "delivery failed, message lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImpairmentConfig;
    use chrono::{NaiveDate, NaiveDateTime};
    use yardwatch_model::Coordinate;

    fn ts(offset: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(i64::from(offset))
    }

    fn dataset(count: u32) -> Vec<Message> {
        (0..count)
            .map(|i| {
                Message::new(
                    u64::from(i),
                    1 + i % 3,
                    ts(i),
                    Coordinate::new(f64::from(i), 0.0),
                    1,
                )
            })
            .collect()
    }

    fn steady_lossless() -> LinkConfig {
        LinkConfig::default()
            .with_impairment(ImpairmentConfig::lossless())
            .with_pacing(PacingConfig::default().with_jitter(0.0))
    }

    fn collect(channel: &Arc<Channel>) -> tokio::task::JoinHandle<Vec<Message>> {
        let channel = Arc::clone(channel);
        tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(message) = channel.receive().await {
                received.push(message);
            }
            received
        })
    }

    #[tokio::test(start_paused = true)]
    async fn lossless_link_delivers_everything_in_order() {
        let stats = Arc::new(LinkStats::new());
        let channel = Arc::new(Channel::new(8).unwrap());
        let driver = ReplayDriver::new(dataset(51), &steady_lossless(), Arc::clone(&stats)).unwrap();

        let consumer = collect(&channel);
        let summary = driver.run(Arc::clone(&channel)).await;
        let received = consumer.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(summary.messages_replayed, 51);
        assert_eq!(snapshot.generated, 51);
        assert_eq!(snapshot.delivered, 51);
        assert_eq!(snapshot.corrupted, 0);
        assert_eq!(snapshot.lost, 0);
        let sequences: Vec<u64> = received.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, (0..51).collect::<Vec<_>>());
        assert!(channel.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn every_message_is_delivered_or_lost() {
        let stats = Arc::new(LinkStats::new());
        let channel = Arc::new(Channel::new(4).unwrap());
        let config = LinkConfig::default()
            .with_impairment(ImpairmentConfig::default().with_loss_probability(0.3))
            .with_pacing(PacingConfig::default().with_speed(10.0));
        let driver = ReplayDriver::new(dataset(300), &config, Arc::clone(&stats)).unwrap();

        let consumer = collect(&channel);
        driver.run(Arc::clone(&channel)).await;
        let received = consumer.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.generated, 300);
        assert_eq!(snapshot.delivered + snapshot.lost, snapshot.generated);
        assert_eq!(received.len(), usize::try_from(snapshot.delivered).unwrap());
        assert!(snapshot.lost > 0);
        assert!(snapshot.delayed > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_spaces_transmissions() {
        let stats = Arc::new(LinkStats::new());
        let channel = Arc::new(Channel::new(16).unwrap());
        let driver = ReplayDriver::new(dataset(5), &steady_lossless(), stats).unwrap();

        let consumer = collect(&channel);
        let summary = driver.run(Arc::clone(&channel)).await;
        consumer.await.unwrap();

        assert!(summary.elapsed >= Duration::from_secs(4));
        assert!(summary.elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_deliveries_land_before_close() {
        let stats = Arc::new(LinkStats::new());
        let channel = Arc::new(Channel::new(32).unwrap());
        let config = steady_lossless()
            .with_impairment(ImpairmentConfig::lossless().with_max_delay_seconds(5.0));
        let driver = ReplayDriver::new(dataset(20), &config, Arc::clone(&stats)).unwrap();

        let consumer = collect(&channel);
        driver.run(Arc::clone(&channel)).await;
        let received = consumer.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.delivered, 20);
        assert_eq!(received.len(), 20);
        assert!(snapshot.delayed > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_pacing_and_closes_channel() {
        let stats = Arc::new(LinkStats::new());
        let channel = Arc::new(Channel::new(64).unwrap());
        let driver = ReplayDriver::new(dataset(10), &steady_lossless(), Arc::clone(&stats)).unwrap();
        let stop = driver.stop_handle();

        let replay = tokio::spawn(driver.run(Arc::clone(&channel)));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        stop.stop();
        let summary = replay.await.unwrap();

        assert!(summary.stopped_early);
        assert_eq!(summary.messages_replayed, 3);
        assert!(channel.is_closed());
        assert_eq!(channel.len(), 3);
        assert_eq!(stats.snapshot().generated, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_channel_counts_as_loss() {
        let stats = Arc::new(LinkStats::new());
        let channel = Arc::new(Channel::new(4).unwrap());
        channel.close();
        let driver = ReplayDriver::new(dataset(6), &steady_lossless(), Arc::clone(&stats)).unwrap();

        driver.run(Arc::clone(&channel)).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.generated, 6);
        assert_eq!(snapshot.delivered, 0);
        assert_eq!(snapshot.lost, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn replays_in_timestamp_order() {
        let mut messages = dataset(6);
        messages.reverse();
        let stats = Arc::new(LinkStats::new());
        let channel = Arc::new(Channel::new(8).unwrap());
        let driver = ReplayDriver::new(messages, &steady_lossless(), stats).unwrap();
        assert_eq!(driver.len(), 6);

        let consumer = collect(&channel);
        driver.run(Arc::clone(&channel)).await;
        let sequences: Vec<u64> = consumer
            .await
            .unwrap()
            .iter()
            .map(|m| m.sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = LinkConfig::default().with_channel_capacity(0);
        let result = ReplayDriver::new(dataset(1), &config, Arc::new(LinkStats::new()));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn stop_handle_resolves_after_stop() {
        let handle = StopHandle::new();
        assert!(!handle.is_stopped());
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.stopped().await })
        };
        tokio::task::yield_now().await;
        handle.stop();
        waiter.await.unwrap();
        assert!(handle.is_stopped());
        handle.stopped().await;
    }
}
