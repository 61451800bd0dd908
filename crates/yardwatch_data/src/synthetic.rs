//! Synthetic dataset generation for demos and tests.
//!
//! Generates a yard directory and a machine message set with configurable:
//! - Fleet and directory sizes
//! - Share of messages reported from inside a yard
//! - Share of yards that get visited at all
//! - Report spacing
//!
//! Machines stay in one place for a short stretch of reports before moving,
//! so consecutive reports from the same yard accumulate working time.

use crate::error::Result;
use chrono::{NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::info;
use yardwatch_model::{Coordinate, Location, MachineId, Message, YardDirectory, YardId, YardSpec};

/// Half-width of the square in which yard centres are placed.
const FIELD_SPAN: f64 = 100.0;
/// Largest distance of an in-yard report from the yard centre.
const YARD_SPREAD: f64 = 8.0;
/// Extra spread of reports taken outside every yard.
const OUTSIDE_SPREAD: f64 = 15.0;

/// Configuration for synthetic dataset generation.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Number of yards to generate.
    pub yard_count: RangeInclusive<u32>,
    /// Number of machines to generate.
    pub machine_count: RangeInclusive<u32>,
    /// Reports per machine.
    pub messages_per_machine: RangeInclusive<u32>,
    /// Reports a machine sends before it may move.
    pub dwell: RangeInclusive<u32>,
    /// Yard area bounds.
    pub area: RangeInclusive<f64>,
    /// Cleaning rate bounds.
    pub cleaning_rate: RangeInclusive<f64>,
    /// Share of reports sent from inside a yard (0.0 - 1.0).
    pub in_yard_share: f64,
    /// Share of yards that machines visit (0.0 - 1.0).
    pub coverage_share: f64,
    /// Mean gap between two reports of one machine, in seconds.
    pub interval_seconds: f64,
    /// Time of the earliest report.
    pub start: NaiveDateTime,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            yard_count: 10..=15,
            machine_count: 5..=8,
            messages_per_machine: 12..=20,
            dwell: 3..=6,
            area: 100.0..=1000.0,
            cleaning_rate: 0.5..=3.0,
            in_yard_share: 0.8,
            coverage_share: 0.8,
            interval_seconds: 1.0,
            start: NaiveDate::from_ymd_opt(2024, 5, 1)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .unwrap_or_default(),
        }
    }
}

impl SyntheticConfig {
    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fixes the number of machines.
    #[must_use]
    pub const fn with_machines(mut self, count: u32) -> Self {
        self.machine_count = count..=count;
        self
    }

    /// Fixes the number of yards.
    #[must_use]
    pub const fn with_yards(mut self, count: u32) -> Self {
        self.yard_count = count..=count;
        self
    }

    /// Fixes the number of reports per machine.
    #[must_use]
    pub const fn with_messages_per_machine(mut self, count: u32) -> Self {
        self.messages_per_machine = count..=count;
        self
    }
}

/// A generated directory and message set.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticDataset {
    /// Yards in id order.
    pub yards: Vec<YardSpec>,
    /// Messages in timestamp order, sequence numbers ascending.
    pub messages: Vec<Message>,
}

impl SyntheticDataset {
    /// Builds the yard directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the generated yards are invalid.
    pub fn directory(&self) -> Result<YardDirectory> {
        Ok(YardDirectory::new(self.yards.clone())?)
    }

    /// Writes the yards as `yard_id,area,cleaning_rate` lines.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_yards<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "# Yard directory")?;
        writeln!(writer, "# yard_id,area,cleaning_rate")?;
        for yard in &self.yards {
            writeln!(writer, "{},{},{}", yard.id, yard.area, yard.cleaning_rate)?;
        }
        Ok(())
    }

    /// Writes the messages as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_messages<W: Write>(&self, writer: W) -> Result<()> {
        let records: Vec<MessageRecord> = self.messages.iter().map(MessageRecord::from).collect();
        serde_json::to_writer_pretty(writer, &records)?;
        Ok(())
    }

    /// Writes `yards.txt` and `machine_messages.json` into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or files cannot be written.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let yards_path = dir.join("yards.txt");
        let messages_path = dir.join("machine_messages.json");
        self.write_yards(std::io::BufWriter::new(std::fs::File::create(&yards_path)?))?;
        self.write_messages(std::io::BufWriter::new(std::fs::File::create(
            &messages_path,
        )?))?;
        info!(
            yards = self.yards.len(),
            messages = self.messages.len(),
            "Synthetic dataset written to {}",
            dir.display()
        );
        Ok((yards_path, messages_path))
    }
}

#[derive(Serialize)]
struct MessageRecord {
    sequence: u64,
    machine_id: Option<MachineId>,
    timestamp: Option<String>,
    x: f64,
    y: f64,
    // Absent for a missing location, null for outside every yard.
    #[serde(skip_serializing_if = "Option::is_none")]
    yard_id: Option<Option<YardId>>,
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        Self {
            sequence: message.sequence,
            machine_id: message.machine_id,
            timestamp: message
                .timestamp
                .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
            x: message.position.x,
            y: message.position.y,
            yard_id: message.location.map(Location::yard),
        }
    }
}

/// Synthetic dataset generator.
pub struct SyntheticGenerator {
    config: SyntheticConfig,
    rng: ChaCha8Rng,
}

impl SyntheticGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Generates a dataset with the configured parameters.
    pub fn generate(&mut self) -> SyntheticDataset {
        let yards = self.generate_yards();
        let centres: Vec<Coordinate> = yards
            .iter()
            .map(|_| {
                Coordinate::new(
                    self.rng.gen_range(-FIELD_SPAN..=FIELD_SPAN),
                    self.rng.gen_range(-FIELD_SPAN..=FIELD_SPAN),
                )
            })
            .collect();
        let visited = self.select_visited(&yards);

        let mut timeline: Vec<(NaiveDateTime, MachineId, Coordinate, Option<YardId>)> = Vec::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        let machines = self.rng.gen_range(self.config.machine_count.clone());

        for machine_id in 1..=machines {
            let reports = self.rng.gen_range(self.config.messages_per_machine.clone());
            let mut time = self.config.start + millis(self.rng.gen_range(0.0..300.0));
            let mut place: Option<usize> = None;
            let mut remaining = 0;

            for _ in 0..reports {
                if remaining == 0 {
                    place = if self.rng.gen_bool(self.config.in_yard_share) {
                        self.next_visit(&visited, &mut queue)
                    } else {
                        None
                    };
                    remaining = self.rng.gen_range(self.config.dwell.clone());
                }
                remaining -= 1;

                let position = match place {
                    Some(index) => self.near(centres[index], YARD_SPREAD),
                    None => {
                        let anywhere = Coordinate::new(
                            self.rng.gen_range(-FIELD_SPAN..=FIELD_SPAN),
                            self.rng.gen_range(-FIELD_SPAN..=FIELD_SPAN),
                        );
                        self.near(anywhere, OUTSIDE_SPREAD)
                    }
                };
                timeline.push((time, machine_id, position, place.map(|i| yards[i].id)));

                let gap = self.config.interval_seconds * self.rng.gen_range(0.8..=1.2);
                time += millis(gap);
            }
        }

        timeline.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        let messages = timeline
            .into_iter()
            .zip(0_u64..)
            .map(|((timestamp, machine_id, position, yard), sequence)| Message {
                sequence,
                machine_id: Some(machine_id),
                timestamp: Some(timestamp),
                position,
                location: Some(Location::from(yard)),
            })
            .collect();

        SyntheticDataset { yards, messages }
    }

    fn generate_yards(&mut self) -> Vec<YardSpec> {
        let count = self.rng.gen_range(self.config.yard_count.clone());
        (1..=count)
            .filter_map(|id| {
                let area = round_to(self.rng.gen_range(self.config.area.clone()), 1);
                let rate = round_to(self.rng.gen_range(self.config.cleaning_rate.clone()), 2);
                YardSpec::new(id, area, rate).ok()
            })
            .collect()
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn select_visited(&mut self, yards: &[YardSpec]) -> Vec<usize> {
        let wanted = ((yards.len() as f64 * self.config.coverage_share) as usize)
            .clamp(1, yards.len().max(1));
        let mut indices: Vec<usize> = (0..yards.len()).collect();
        indices.shuffle(&mut self.rng);
        indices.truncate(wanted);
        indices
    }

    // Cycles through the visited yards in shuffled rounds so every one of
    // them gets a turn before any repeats.
    fn next_visit(&mut self, visited: &[usize], queue: &mut VecDeque<usize>) -> Option<usize> {
        if queue.is_empty() {
            let mut round = visited.to_vec();
            round.shuffle(&mut self.rng);
            queue.extend(round);
        }
        queue.pop_front()
    }

    fn near(&mut self, centre: Coordinate, spread: f64) -> Coordinate {
        Coordinate::new(
            round_to(centre.x + self.rng.gen_range(-spread..=spread), 2),
            round_to(centre.y + self.rng.gen_range(-spread..=spread), 2),
        )
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(seconds: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((seconds * 1000.0).round() as i64)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
