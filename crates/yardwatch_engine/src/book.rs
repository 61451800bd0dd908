//! The machine book: every machine a consumer worker owns.
//!
//! The book validates delivered messages, keeps per-machine state and turns
//! accumulated working time into [`YardCredit`]s. Credits leave the book
//! through a [`CreditSink`], which is either the yard ledger itself
//! (single-threaded use) or a channel to the ledger task.

use crate::config::{EngineConfig, FlushPolicy};
use crate::machine::{Machine, Outcome};
use crate::result::MachineSnapshot;
use crate::validate::{validate, Rejection};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use yardwatch_link::LinkStats;
use yardwatch_model::{MachineId, Message, YardDirectory, YardId};

/// Machine working time handed to a yard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YardCredit {
    /// Receiving yard.
    pub yard_id: YardId,
    /// Machine that did the work.
    pub machine_id: MachineId,
    /// Seconds of work.
    pub seconds: f64,
    /// Timestamp of the message that produced the credit.
    pub at: NaiveDateTime,
}

/// Destination for yard credits.
pub trait CreditSink {
    /// Accepts one credit.
    fn credit(&mut self, credit: YardCredit);
}

impl CreditSink for Vec<YardCredit> {
    fn credit(&mut self, credit: YardCredit) {
        self.push(credit);
    }
}

impl CreditSink for mpsc::UnboundedSender<YardCredit> {
    fn credit(&mut self, credit: YardCredit) {
        if let Err(e) = self.send(credit) {
            warn!(
                yard_id = e.0.yard_id,
                machine_id = e.0.machine_id,
                "ledger stopped, credit dropped"
            );
        }
    }
}

/// Machines owned by one consumer.
#[derive(Debug)]
pub struct MachineBook {
    config: EngineConfig,
    directory: Arc<YardDirectory>,
    stats: Arc<LinkStats>,
    machines: BTreeMap<MachineId, Machine>,
}

impl MachineBook {
    /// Creates an empty book.
    pub fn new(config: EngineConfig, directory: Arc<YardDirectory>, stats: Arc<LinkStats>) -> Self {
        Self {
            config,
            directory,
            stats,
            machines: BTreeMap::new(),
        }
    }

    /// Validates and applies one delivered message.
    ///
    /// Rejections and implausible gaps are counted and logged here; callers
    /// only need the return value for their own bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] that excluded the message.
    pub fn process<S: CreditSink + ?Sized>(
        &mut self,
        message: &Message,
        sink: &mut S,
    ) -> Result<Outcome, Rejection> {
        let valid = match validate(message, &self.directory) {
            Ok(valid) => valid,
            Err(rejection) => return Err(self.reject(message.sequence, rejection)),
        };

        let machine = self
            .machines
            .entry(valid.machine_id)
            .or_insert_with(|| Machine::new(valid.machine_id));

        if machine.is_stale(valid.timestamp, self.config.stale_tolerance_seconds) {
            let rejection = Rejection::Stale {
                timestamp: valid.timestamp,
                last_seen: machine.last_seen().unwrap_or(valid.timestamp),
            };
            return Err(self.reject(message.sequence, rejection));
        }

        if machine.current_yard() != valid.yard {
            if let Some(credit) = machine.take_credit() {
                sink.credit(credit);
            }
        }

        let outcome = machine.observe(&valid, self.config.max_step_seconds);
        match outcome {
            Outcome::Accumulated { .. } => {
                if self.config.flush_policy == FlushPolicy::Eager {
                    if let Some(credit) = machine.take_credit() {
                        sink.credit(credit);
                    }
                }
            }
            Outcome::Implausible { seconds } => {
                self.stats.record_implausible_delta();
                warn!(
                    sequence = valid.sequence,
                    machine_id = valid.machine_id,
                    seconds,
                    "implausible time gap ignored"
                );
            }
            Outcome::Relocated { from, to } => {
                match (from, to) {
                    (None, Some(_)) => self.stats.machine_activated(),
                    (Some(_), None) => self.stats.machine_deactivated(),
                    _ => {}
                }
                debug!(machine_id = valid.machine_id, ?from, ?to, "machine relocated");
            }
            Outcome::Idle => {}
        }

        Ok(outcome)
    }

    fn reject(&self, sequence: u64, rejection: Rejection) -> Rejection {
        self.stats.record_rejected();
        warn!(sequence, reason = %rejection, "message rejected");
        rejection
    }

    /// Flushes every machine's unflushed time into its current yard.
    pub fn finish<S: CreditSink + ?Sized>(&mut self, sink: &mut S) {
        for machine in self.machines.values_mut() {
            if let Some(credit) = machine.take_credit() {
                sink.credit(credit);
            }
        }
    }

    /// Looks up a machine.
    pub fn get(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(&id)
    }

    /// Number of machines seen.
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    /// Returns true if no machine has been seen.
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Machines currently inside a yard.
    pub fn active_machines(&self) -> usize {
        self.machines
            .values()
            .filter(|m| m.current_yard().is_some())
            .count()
    }

    /// Snapshots every machine, ordered by id.
    pub fn snapshots(&self) -> Vec<MachineSnapshot> {
        self.machines.values().map(Machine::snapshot).collect()
    }
}
