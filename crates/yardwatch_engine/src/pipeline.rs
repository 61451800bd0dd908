//! Realtime and batch orchestration.
//!
//! A realtime run wires these tasks together:
//!
//! ```text
//! ReplayDriver ──► Channel ──► [router ──► lane channels] ──► workers
//!                                                                │ credits
//!                                                                ▼
//!                                                          ledger task
//! ```
//!
//! Each worker owns the machines routed to it, so no machine state is ever
//! shared. Yard state lives in the single ledger task. The only state touched
//! by more than one task is the atomic [`LinkStats`].

use crate::book::{MachineBook, YardCredit};
use crate::config::{EngineConfig, RunConfig};
use crate::engine::CleaningEngine;
use crate::error::Result;
use crate::ledger::YardLedger;
use crate::reporter::{LiveReporter, LiveSnapshot};
use crate::result::{fingerprint, MachineSnapshot, RunMode, RunReport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use yardwatch_link::{Channel, Error as LinkError, LinkStats, ReplayDriver, StopHandle};
use yardwatch_model::{Message, YardDirectory};

/// A prepared realtime run.
#[derive(Debug)]
pub struct Pipeline {
    engine: EngineConfig,
    channel_capacity: usize,
    directory: Arc<YardDirectory>,
    driver: ReplayDriver,
    stats: Arc<LinkStats>,
}

struct WorkerOutput {
    machines: Vec<MachineSnapshot>,
    live: Vec<LiveSnapshot>,
}

struct ConsumerTasks {
    channel: Arc<Channel>,
    lanes: Vec<Arc<Channel>>,
    router: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<WorkerOutput>>,
    ledger: JoinHandle<YardLedger>,
}

impl ConsumerTasks {
    /// Closes every channel and aborts every consumer-side task.
    fn shut_down(&self) {
        self.channel.close();
        for lane in &self.lanes {
            lane.close();
        }
        if let Some(router) = &self.router {
            router.abort();
        }
        for worker in &self.workers {
            worker.abort();
        }
        self.ledger.abort();
    }

    /// Waits for the consumers to drain and merges their output.
    async fn collect(self) -> Result<(Vec<MachineSnapshot>, Vec<LiveSnapshot>, YardLedger)> {
        if let Some(router) = self.router {
            router.await?;
        }

        let mut machines = Vec::new();
        let mut live = Vec::new();
        for task in self.workers {
            let output = task.await?;
            machines.extend(output.machines);
            live.extend(output.live);
        }
        machines.sort_by_key(|m| m.machine_id);
        live.sort_by_key(|s| s.consumed);

        let ledger = self.ledger.await?;
        Ok((machines, live, ledger))
    }
}

impl Pipeline {
    /// Validates the configuration and prepares the replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range.
    pub fn new(
        config: &RunConfig,
        directory: Arc<YardDirectory>,
        messages: Vec<Message>,
    ) -> Result<Self> {
        config.validate()?;
        let stats = Arc::new(LinkStats::new());
        let driver = ReplayDriver::new(messages, &config.link, Arc::clone(&stats))?;
        Ok(Self {
            engine: config.engine.clone(),
            channel_capacity: config.link.channel_capacity,
            directory,
            driver,
            stats,
        })
    }

    /// Returns a handle that stops the replay early.
    pub fn stop_handle(&self) -> StopHandle {
        self.driver.stop_handle()
    }

    /// Shared counters, readable while the run is in progress.
    pub fn stats(&self) -> Arc<LinkStats> {
        Arc::clone(&self.stats)
    }

    // Starts the router, workers and ledger; the replay is started by the
    // caller.
    fn spawn_consumers(&self, reporter: LiveReporter) -> Result<ConsumerTasks> {
        let workers = self.engine.workers;
        let channel = Arc::new(Channel::new(self.channel_capacity)?);
        let lanes: Vec<Arc<Channel>> = if workers == 1 {
            vec![Arc::clone(&channel)]
        } else {
            (0..workers)
                .map(|_| Channel::new(self.channel_capacity).map(Arc::new))
                .collect::<std::result::Result<_, _>>()?
        };

        let (credit_tx, credit_rx) = mpsc::unbounded_channel();
        let ledger = tokio::spawn(run_ledger(YardLedger::new(&self.directory), credit_rx));

        let worker_tasks: Vec<JoinHandle<WorkerOutput>> = lanes
            .iter()
            .enumerate()
            .map(|(index, lane)| {
                let book = MachineBook::new(
                    self.engine.clone(),
                    Arc::clone(&self.directory),
                    Arc::clone(&self.stats),
                );
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(lane),
                    book,
                    credit_tx.clone(),
                    Arc::clone(&self.stats),
                    reporter,
                ))
            })
            .collect();
        drop(credit_tx);

        let router =
            (workers > 1).then(|| tokio::spawn(route(Arc::clone(&channel), lanes.clone())));

        Ok(ConsumerTasks {
            channel,
            lanes,
            router,
            workers: worker_tasks,
            ledger,
        })
    }

    /// Runs producer, workers and ledger to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if a channel cannot be created or a task fails.
    pub async fn run(self) -> Result<RunReport> {
        let started = Instant::now();
        let reporter = LiveReporter::new(self.engine.report_every_n_messages, started);
        let workers = self.engine.workers;

        info!(
            messages = self.driver.len(),
            yards = self.directory.len(),
            workers,
            "realtime run started"
        );

        let tasks = self.spawn_consumers(reporter)?;
        let replay = tokio::spawn(self.driver.run(Arc::clone(&tasks.channel)));

        let summary = match replay.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "replay task failed, shutting consumers down");
                tasks.shut_down();
                return Err(e.into());
            }
        };
        let (machines, live, ledger) = tasks.collect().await?;

        let (yards, transitions) = ledger.into_parts();
        let report = RunReport {
            mode: RunMode::Realtime,
            transitions,
            machines,
            fingerprint: fingerprint(&yards),
            yards,
            stats: self.stats.snapshot(),
            live,
            stopped_early: summary.stopped_early,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };

        info!(
            generated = report.stats.generated,
            delivered = report.stats.delivered,
            lost = report.stats.lost,
            rejected = report.stats.rejected,
            transitions = report.transitions.len(),
            completed_yards = report.completed_yards(),
            "realtime run finished"
        );
        Ok(report)
    }
}

/// Replays `messages` over the impaired link and processes them live.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a task fails.
pub async fn run_realtime(
    config: &RunConfig,
    directory: Arc<YardDirectory>,
    messages: Vec<Message>,
) -> Result<RunReport> {
    Pipeline::new(config, directory, messages)?.run().await
}

/// Processes `messages` directly in timestamp order, with no link, pacing or
/// concurrency. Every message counts as generated and delivered.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn run_batch(
    config: &EngineConfig,
    directory: Arc<YardDirectory>,
    mut messages: Vec<Message>,
) -> Result<RunReport> {
    messages.sort_by_key(|m| (m.timestamp, m.sequence));
    let stats = Arc::new(LinkStats::new());
    let mut engine = CleaningEngine::new(config.clone(), directory, Arc::clone(&stats))?;

    info!(messages = messages.len(), "batch run started");
    for message in &messages {
        stats.record_generated();
        stats.record_delivered();
        // Rejections are counted and logged by the engine.
        let _ = engine.process(message);
    }

    let report = engine.finish(RunMode::Batch);
    info!(
        consumed = report.stats.consumed,
        rejected = report.stats.rejected,
        transitions = report.transitions.len(),
        "batch run finished"
    );
    Ok(report)
}

async fn run_ledger(
    mut ledger: YardLedger,
    mut credits: mpsc::UnboundedReceiver<YardCredit>,
) -> YardLedger {
    while let Some(credit) = credits.recv().await {
        ledger.apply(credit);
    }
    debug!(credits = ledger.credits_applied(), "ledger drained");
    ledger
}

async fn run_worker(
    index: usize,
    lane: Arc<Channel>,
    mut book: MachineBook,
    mut credits: mpsc::UnboundedSender<YardCredit>,
    stats: Arc<LinkStats>,
    reporter: LiveReporter,
) -> WorkerOutput {
    let mut live = Vec::new();
    while let Some(message) = lane.receive().await {
        let consumed = stats.record_consumed();
        // Rejections are counted and logged by the book.
        let _ = book.process(&message, &mut credits);
        if reporter.is_due(consumed) {
            live.push(reporter.report(&stats.snapshot()));
        }
    }
    book.finish(&mut credits);
    debug!(worker = index, machines = book.len(), "worker finished");
    WorkerOutput {
        machines: book.snapshots(),
        live,
    }
}

async fn route(source: Arc<Channel>, lanes: Vec<Arc<Channel>>) {
    while let Some(message) = source.receive().await {
        let lane = message
            .machine_id
            .and_then(|id| usize::try_from(id).ok())
            .map_or(0, |id| id % lanes.len());
        if let Err(LinkError::ChannelClosed(message)) = lanes[lane].send(message).await {
            warn!(sequence = message.sequence, lane, "lane closed, message dropped");
        }
    }
    for lane in &lanes {
        lane.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use yardwatch_link::{ImpairmentConfig, LinkConfig, PacingConfig};
    use yardwatch_model::{CleaningStatus, Coordinate, YardSpec};

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(i64::from(second))
    }

    fn directory() -> Arc<YardDirectory> {
        Arc::new(
            YardDirectory::new(vec![
                YardSpec::new(1, 100.0, 1.0).unwrap(),
                YardSpec::new(2, 60.0, 0.5).unwrap(),
                YardSpec::new(3, 400.0, 2.0).unwrap(),
            ])
            .unwrap(),
        )
    }

    /// Four machines, each reporting every 5 s from its own yard.
    fn dataset() -> Vec<Message> {
        let mut messages = Vec::new();
        let mut sequence = 0;
        for step in 0..30 {
            for machine in 1..=4 {
                let yard = 1 + machine % 3;
                messages.push(Message::new(
                    sequence,
                    machine,
                    at(step * 5),
                    Coordinate::new(f64::from(machine), f64::from(step)),
                    yard,
                ));
                sequence += 1;
            }
        }
        messages
    }

    fn lossless(workers: usize) -> RunConfig {
        RunConfig {
            link: LinkConfig::default()
                .with_impairment(ImpairmentConfig::lossless())
                .with_pacing(PacingConfig::default().with_speed(20.0).with_jitter(0.0))
                .with_channel_capacity(4),
            engine: EngineConfig::default().with_workers(workers),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lossless_realtime_matches_batch() {
        let batch = run_batch(&EngineConfig::default(), directory(), dataset()).unwrap();
        let live = run_realtime(&lossless(1), directory(), dataset())
            .await
            .unwrap();

        assert_eq!(live.stats.generated, 120);
        assert_eq!(live.stats.delivered, 120);
        assert_eq!(live.stats.consumed, 120);
        assert_eq!(live.stats.corrupted, 0);
        assert_eq!(live.fingerprint, batch.fingerprint);
        assert_eq!(live.transitions, batch.transitions);
        assert_eq!(live.machines, batch.machines);
        assert_eq!(live.live.len(), 24);
    }

    #[tokio::test(start_paused = true)]
    async fn workers_partition_machines() {
        let single = run_realtime(&lossless(1), directory(), dataset())
            .await
            .unwrap();
        let sharded = run_realtime(&lossless(3), directory(), dataset())
            .await
            .unwrap();

        assert_eq!(sharded.stats.consumed, 120);
        assert_eq!(sharded.machines.len(), 4);
        assert_eq!(sharded.machines, single.machines);
        let statuses = |r: &RunReport| r.yards.iter().map(|y| y.status).collect::<Vec<_>>();
        assert_eq!(statuses(&sharded), statuses(&single));
        assert_eq!(sharded.fingerprint, single.fingerprint);
    }

    #[tokio::test(start_paused = true)]
    async fn impaired_link_accounts_for_every_message() {
        let config = RunConfig {
            link: LinkConfig::default()
                .with_impairment(ImpairmentConfig::default().with_loss_probability(0.2))
                .with_pacing(PacingConfig::default().with_speed(20.0)),
            engine: EngineConfig::default().with_workers(2),
        };
        let report = run_realtime(&config, directory(), dataset()).await.unwrap();

        let stats = report.stats;
        assert_eq!(stats.generated, 120);
        assert_eq!(stats.delivered + stats.lost, stats.generated);
        assert_eq!(stats.consumed, stats.delivered);
        assert!(stats.lost > 0);
        for window in report.transitions.windows(2) {
            if window[0].yard_id == window[1].yard_id {
                assert!(window[1].from >= window[0].to);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_still_produces_a_report() {
        let pipeline = Pipeline::new(&lossless(1), directory(), dataset()).unwrap();
        let stop = pipeline.stop_handle();
        let run = tokio::spawn(pipeline.run());
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        stop.stop();
        let report = run.await.unwrap().unwrap();

        assert!(report.stopped_early);
        assert!(report.stats.generated < 120);
        assert_eq!(report.stats.consumed, report.stats.generated);
    }

    #[tokio::test(start_paused = true)]
    async fn shutting_down_releases_idle_consumers() {
        let pipeline = Pipeline::new(&lossless(3), directory(), dataset()).unwrap();
        let reporter = LiveReporter::new(5, Instant::now());
        let tasks = pipeline.spawn_consumers(reporter).unwrap();

        // Nothing ever feeds the channel, as when the replay task dies.
        tasks.shut_down();
        assert!(tasks.channel.is_closed());
        assert!(tasks.lanes.iter().all(|lane| lane.is_closed()));

        let finished =
            tokio::time::timeout(std::time::Duration::from_secs(60), tasks.collect()).await;
        assert!(finished.is_ok());
    }

    #[test]
    fn batch_is_idempotent() {
        let first = run_batch(&EngineConfig::default(), directory(), dataset()).unwrap();
        let second = run_batch(&EngineConfig::default(), directory(), dataset()).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.transitions, second.transitions);

        // machine 3 sits in yard 1 (100 m², 1 m²/s) for 145 s
        assert_eq!(first.yard(1).unwrap().status, CleaningStatus::Complete);
        assert_eq!(first.stats.generated, 120);
        assert!((first.stats.reliability_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_config_fails_before_running() {
        let config = RunConfig {
            engine: EngineConfig::default().with_workers(0),
            ..RunConfig::default()
        };
        assert!(Pipeline::new(&config, directory(), dataset()).is_err());
    }
}
