//! Run report types.

use crate::ledger::YardTransition;
use crate::reporter::LiveSnapshot;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use xxhash_rust::xxh64::xxh64;
use yardwatch_link::StatsSnapshot;
use yardwatch_model::{CleaningStatus, Coordinate, MachineId, Yard, YardId};

/// How the messages reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Paced replay over the impaired link.
    Realtime,
    /// Direct, lossless processing of the dataset.
    Batch,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Realtime => write!(f, "realtime"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Final state of one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Machine id.
    pub machine_id: MachineId,
    /// Last reported position.
    pub position: Coordinate,
    /// Yard the machine ended in.
    pub current_yard: Option<YardId>,
    /// Latest accepted timestamp.
    pub last_seen: Option<NaiveDateTime>,
    /// Accepted message count.
    pub messages_accepted: u64,
    /// Seconds worked per yard.
    pub seconds_by_yard: BTreeMap<YardId, f64>,
}

impl MachineSnapshot {
    /// Seconds worked across all yards.
    pub fn total_seconds(&self) -> f64 {
        self.seconds_by_yard.values().sum()
    }
}

/// Final state of one yard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YardSnapshot {
    /// Yard id.
    pub yard_id: YardId,
    /// Total area.
    pub area: f64,
    /// Area cleaned per second.
    pub cleaning_rate: f64,
    /// Machine-seconds credited.
    pub cleaned_seconds: f64,
    /// Completion percentage.
    pub percentage: f64,
    /// Discrete status.
    pub status: CleaningStatus,
    /// Area cleaned so far.
    pub cleaned_area: f64,
    /// Area still to clean.
    pub remaining_area: f64,
    /// Machine-seconds of work still needed.
    pub estimated_seconds_to_complete: f64,
}

impl From<&Yard> for YardSnapshot {
    fn from(yard: &Yard) -> Self {
        Self {
            yard_id: yard.id(),
            area: yard.spec().area,
            cleaning_rate: yard.spec().cleaning_rate,
            cleaned_seconds: yard.cleaned_seconds(),
            percentage: yard.percentage(),
            status: yard.status(),
            cleaned_area: yard.cleaned_area(),
            remaining_area: yard.remaining_area(),
            estimated_seconds_to_complete: yard.estimated_seconds_to_complete(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// How the run was driven.
    pub mode: RunMode,
    /// Status changes in the order the ledger applied them.
    pub transitions: Vec<YardTransition>,
    /// Machines ordered by id.
    pub machines: Vec<MachineSnapshot>,
    /// Yards in directory order.
    pub yards: Vec<YardSnapshot>,
    /// Transmission and processing counters.
    pub stats: StatsSnapshot,
    /// Periodic live snapshots, ordered by consumed count.
    pub live: Vec<LiveSnapshot>,
    /// True if the replay was stopped before the dataset was exhausted.
    pub stopped_early: bool,
    /// Run duration in seconds.
    pub elapsed_seconds: f64,
    /// Hash of the final yard statuses.
    pub fingerprint: u64,
}

impl RunReport {
    /// Number of yards at 100%.
    pub fn completed_yards(&self) -> usize {
        self.yards
            .iter()
            .filter(|y| y.status.is_complete())
            .count()
    }

    /// Mean completion percentage over all yards.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_completion(&self) -> f64 {
        if self.yards.is_empty() {
            return 0.0;
        }
        self.yards.iter().map(|y| y.percentage).sum::<f64>() / self.yards.len() as f64
    }

    /// Cleaned share of the total yard area, in percent.
    pub fn cleaning_efficiency(&self) -> f64 {
        let total: f64 = self.yards.iter().map(|y| y.area).sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.yards.iter().map(|y| y.cleaned_area).sum::<f64>() / total * 100.0
    }

    /// Looks up a yard snapshot.
    pub fn yard(&self, id: YardId) -> Option<&YardSnapshot> {
        self.yards.iter().find(|y| y.yard_id == id)
    }

    /// Looks up a machine snapshot.
    pub fn machine(&self, id: MachineId) -> Option<&MachineSnapshot> {
        self.machines.iter().find(|m| m.machine_id == id)
    }

    /// Machines that ended inside a yard.
    pub fn active_machines(&self) -> usize {
        self.machines
            .iter()
            .filter(|m| m.current_yard.is_some())
            .count()
    }
}

/// Hashes yard ids, statuses and credited time (to the millisecond).
pub fn fingerprint(yards: &[YardSnapshot]) -> u64 {
    let mut input = String::new();
    for yard in yards {
        let _ = write!(
            input,
            "{}:{}:{:.3};",
            yard.yard_id,
            yard.status.percent(),
            yard.cleaned_seconds
        );
    }
    xxh64(input.as_bytes(), 0)
}
