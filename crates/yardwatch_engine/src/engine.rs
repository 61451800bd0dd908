//! Single-threaded cleaning state engine.
//!
//! Owns a machine book and the yard ledger directly, with no tasks or
//! channels in between. Used for batch runs and wherever a caller already
//! serializes message delivery.

use crate::book::MachineBook;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::YardLedger;
use crate::machine::Outcome;
use crate::reporter::{LiveReporter, LiveSnapshot};
use crate::result::{fingerprint, RunMode, RunReport};
use crate::validate::Rejection;
use std::sync::Arc;
use tokio::time::Instant;
use yardwatch_link::LinkStats;
use yardwatch_model::{Message, YardDirectory};

/// Turns delivered messages into machine and yard state.
#[derive(Debug)]
pub struct CleaningEngine {
    book: MachineBook,
    ledger: YardLedger,
    stats: Arc<LinkStats>,
    reporter: LiveReporter,
    live: Vec<LiveSnapshot>,
    started: Instant,
}

impl CleaningEngine {
    /// Creates an engine with every yard at 0%.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range.
    pub fn new(
        config: EngineConfig,
        directory: Arc<YardDirectory>,
        stats: Arc<LinkStats>,
    ) -> Result<Self> {
        config.validate()?;
        let started = Instant::now();
        Ok(Self {
            ledger: YardLedger::new(&directory),
            reporter: LiveReporter::new(config.report_every_n_messages, started),
            book: MachineBook::new(config, directory, Arc::clone(&stats)),
            stats,
            live: Vec::new(),
            started,
        })
    }

    /// Consumes one delivered message.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] if the message was excluded.
    pub fn process(&mut self, message: &Message) -> std::result::Result<Outcome, Rejection> {
        let consumed = self.stats.record_consumed();
        let outcome = self.book.process(message, &mut self.ledger);
        if self.reporter.is_due(consumed) {
            self.live.push(self.reporter.report(&self.stats.snapshot()));
        }
        outcome
    }

    /// Machine book.
    pub const fn book(&self) -> &MachineBook {
        &self.book
    }

    /// Yard ledger.
    pub const fn ledger(&self) -> &YardLedger {
        &self.ledger
    }

    /// Live snapshots taken so far.
    pub fn live(&self) -> &[LiveSnapshot] {
        &self.live
    }

    /// Flushes pending machine time and builds the report.
    pub fn finish(mut self, mode: RunMode) -> RunReport {
        self.book.finish(&mut self.ledger);
        let machines = self.book.snapshots();
        let (yards, transitions) = self.ledger.into_parts();
        RunReport {
            mode,
            transitions,
            machines,
            fingerprint: fingerprint(&yards),
            yards,
            stats: self.stats.snapshot(),
            live: self.live,
            stopped_early: false,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
        }
    }
}
