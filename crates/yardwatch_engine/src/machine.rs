//! Per-machine working-time accounting.

use crate::book::YardCredit;
use crate::result::MachineSnapshot;
use crate::validate::ValidMessage;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use yardwatch_model::{Coordinate, MachineId, YardId};

/// What one accepted message did to a machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Time was added to the current yard.
    Accumulated {
        /// Seconds added.
        seconds: f64,
    },
    /// Nothing to count: first sighting in place, zero gap, or outside.
    Idle,
    /// The gap was negative or too long and was ignored.
    Implausible {
        /// The rejected gap in seconds.
        seconds: f64,
    },
    /// The machine changed location; no time was counted.
    Relocated {
        /// Previous yard, `None` if outside or newly seen.
        from: Option<YardId>,
        /// New yard, `None` if outside.
        to: Option<YardId>,
    },
}

/// Long-lived state of one cleaning machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    id: MachineId,
    position: Coordinate,
    current_yard: Option<YardId>,
    last_seen: Option<NaiveDateTime>,
    working_seconds: f64,
    unflushed_seconds: f64,
    messages_accepted: u64,
    seconds_by_yard: BTreeMap<YardId, f64>,
}

impl Machine {
    /// Creates a machine that has not reported yet.
    #[must_use]
    pub const fn new(id: MachineId) -> Self {
        Self {
            id,
            position: Coordinate::new(0.0, 0.0),
            current_yard: None,
            last_seen: None,
            working_seconds: 0.0,
            unflushed_seconds: 0.0,
            messages_accepted: 0,
            seconds_by_yard: BTreeMap::new(),
        }
    }

    /// Machine id.
    pub const fn id(&self) -> MachineId {
        self.id
    }

    /// Last reported position (stored even when corrupted).
    pub const fn position(&self) -> Coordinate {
        self.position
    }

    /// Yard the machine is in.
    pub const fn current_yard(&self) -> Option<YardId> {
        self.current_yard
    }

    /// Latest accepted timestamp.
    pub const fn last_seen(&self) -> Option<NaiveDateTime> {
        self.last_seen
    }

    /// Seconds worked since entering the current yard.
    pub const fn working_seconds(&self) -> f64 {
        self.working_seconds
    }

    /// Seconds not yet credited to a yard.
    pub const fn unflushed_seconds(&self) -> f64 {
        self.unflushed_seconds
    }

    /// Accepted message count.
    pub const fn messages_accepted(&self) -> u64 {
        self.messages_accepted
    }

    /// Cumulative seconds per yard visited.
    pub const fn seconds_by_yard(&self) -> &BTreeMap<YardId, f64> {
        &self.seconds_by_yard
    }

    /// Returns true if `timestamp` lies more than `tolerance_seconds` before
    /// the latest accepted timestamp.
    pub fn is_stale(&self, timestamp: NaiveDateTime, tolerance_seconds: f64) -> bool {
        self.last_seen
            .is_some_and(|last| seconds_between(timestamp, last) > tolerance_seconds)
    }

    /// Applies an accepted message.
    ///
    /// Unflushed time of the previous yard must be taken with
    /// [`Machine::take_credit`] before a relocating message is observed.
    pub fn observe(&mut self, message: &ValidMessage, max_step_seconds: f64) -> Outcome {
        self.messages_accepted += 1;
        self.position = message.position;
        let previous = self.last_seen;
        self.last_seen = Some(previous.map_or(message.timestamp, |last| last.max(message.timestamp)));

        if message.yard != self.current_yard {
            let from = self.current_yard;
            self.current_yard = message.yard;
            self.working_seconds = 0.0;
            return Outcome::Relocated {
                from,
                to: message.yard,
            };
        }

        let (Some(yard), Some(last)) = (self.current_yard, previous) else {
            return Outcome::Idle;
        };

        let delta = seconds_between(last, message.timestamp);
        if delta < 0.0 || delta > max_step_seconds {
            return Outcome::Implausible { seconds: delta };
        }
        if delta <= 0.0 {
            return Outcome::Idle;
        }

        self.working_seconds += delta;
        self.unflushed_seconds += delta;
        *self.seconds_by_yard.entry(yard).or_insert(0.0) += delta;
        Outcome::Accumulated { seconds: delta }
    }

    /// Moves the unflushed seconds into a credit for the current yard.
    ///
    /// Returns `None` when there is nothing to credit or the machine is
    /// outside every yard.
    pub fn take_credit(&mut self) -> Option<YardCredit> {
        let yard_id = self.current_yard?;
        let at = self.last_seen?;
        if self.unflushed_seconds <= 0.0 {
            return None;
        }
        let seconds = std::mem::take(&mut self.unflushed_seconds);
        Some(YardCredit {
            yard_id,
            machine_id: self.id,
            seconds,
            at,
        })
    }

    /// Copies the reportable state.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            machine_id: self.id,
            position: self.position,
            current_yard: self.current_yard,
            last_seen: self.last_seen,
            messages_accepted: self.messages_accepted,
            seconds_by_yard: self.seconds_by_yard.clone(),
        }
    }
}

/// Signed seconds from `earlier` to `later`, at millisecond resolution.
#[allow(clippy::cast_precision_loss)]
pub fn seconds_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}
