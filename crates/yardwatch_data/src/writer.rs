//! Report writers.
//!
//! Output files produced by [`save_all`]:
//! - `yard_status_changes.csv`: every status transition, in ledger order
//! - `final_machine_positions.csv`: last known state of every machine
//! - `summary_report.txt`: human-readable run summary
//! - `run_report.json`: the full [`RunReport`]

use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use yardwatch_engine::{RunReport, YardTransition};
use yardwatch_model::{CleaningStatus, YardId};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Serialize)]
struct StatusChangeRow {
    yard_id: YardId,
    from: u8,
    to: u8,
    timestamp: String,
    machine_id: u32,
}

impl From<&YardTransition> for StatusChangeRow {
    fn from(transition: &YardTransition) -> Self {
        Self {
            yard_id: transition.yard_id,
            from: transition.from.percent(),
            to: transition.to.percent(),
            timestamp: transition.at.format(TIMESTAMP_FORMAT).to_string(),
            machine_id: transition.machine_id,
        }
    }
}

#[derive(Serialize)]
struct MachinePositionRow {
    machine_id: u32,
    x: String,
    y: String,
    yard_id: Option<YardId>,
    messages_accepted: u64,
    seconds_worked: String,
}

/// Writes the status transitions as CSV.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_status_changes<W: Write>(report: &RunReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if report.transitions.is_empty() {
        csv.write_record(["yard_id", "from", "to", "timestamp", "machine_id"])?;
    }
    for transition in &report.transitions {
        csv.serialize(StatusChangeRow::from(transition))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the final machine states as CSV. Machines outside every yard get
/// an empty `yard_id`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_machine_positions<W: Write>(report: &RunReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if report.machines.is_empty() {
        csv.write_record([
            "machine_id",
            "x",
            "y",
            "yard_id",
            "messages_accepted",
            "seconds_worked",
        ])?;
    }
    for machine in &report.machines {
        csv.serialize(MachinePositionRow {
            machine_id: machine.machine_id,
            x: format!("{:.2}", machine.position.x),
            y: format!("{:.2}", machine.position.y),
            yard_id: machine.current_yard,
            messages_accepted: machine.messages_accepted,
            seconds_worked: format!("{:.1}", machine.total_seconds()),
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// Renders the human-readable summary.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let stats = &report.stats;
    let in_yard = report.active_machines();
    let completed = report.completed_yards();
    let untouched = report
        .yards
        .iter()
        .filter(|y| y.cleaned_seconds <= 0.0)
        .count();
    let partial = report.yards.len() - completed - untouched;

    let _ = writeln!(out, "Yardwatch cleaning summary");
    let _ = writeln!(out, "==========================");
    let _ = writeln!(out, "Mode: {}", report.mode);
    if report.stopped_early {
        let _ = writeln!(out, "Replay stopped before the dataset was exhausted");
    }
    let _ = writeln!(out, "Fingerprint: {:016x}", report.fingerprint);

    let _ = writeln!(out, "\nGeneral statistics");
    let _ = writeln!(out, "  Machines: {}", report.machines.len());
    let _ = writeln!(out, "  Yards: {}", report.yards.len());
    let _ = writeln!(out, "  Status changes: {}", report.transitions.len());
    let _ = writeln!(out, "  Machines in a yard: {in_yard}");
    let _ = writeln!(out, "  Machines outside: {}", report.machines.len() - in_yard);
    let _ = writeln!(out, "  Completed yards: {completed}");
    let _ = writeln!(out, "  Partially cleaned yards: {partial}");
    let _ = writeln!(out, "  Untouched yards: {untouched}");
    let grouped: Vec<String> = yards_by_status(report)
        .into_iter()
        .map(|(status, ids)| format!("{status}: {}", ids.len()))
        .collect();
    let _ = writeln!(out, "  Yards by status: {}", grouped.join(", "));
    let _ = writeln!(out, "  Average completion: {:.1}%", report.average_completion());
    let _ = writeln!(out, "  Cleaning efficiency: {:.1}%", report.cleaning_efficiency());

    let _ = writeln!(out, "\nTransmission");
    let _ = writeln!(out, "  Generated: {}", stats.generated);
    let _ = writeln!(out, "  Delivered: {}", stats.delivered);
    let _ = writeln!(out, "  Lost: {}", stats.lost);
    let _ = writeln!(out, "  Delayed: {}", stats.delayed);
    let _ = writeln!(out, "  Corrupted: {}", stats.corrupted);
    let _ = writeln!(out, "  Rejected: {}", stats.rejected);
    let _ = writeln!(out, "  Implausible deltas: {}", stats.implausible_deltas);
    let _ = writeln!(out, "  Reliability: {:.1}%", stats.reliability_percent());
    let _ = writeln!(out, "  Error rate: {:.1}%", stats.error_rate_percent());

    let _ = writeln!(out, "\nYards");
    for yard in &report.yards {
        let _ = writeln!(
            out,
            "  Yard {}: {:.1}% ({:.1}/{:.1} cleaned, {:.1} remaining), status {}, {:.1} s worked, {:.1} s to complete",
            yard.yard_id,
            yard.percentage,
            yard.cleaned_area,
            yard.area,
            yard.remaining_area,
            yard.status,
            yard.cleaned_seconds,
            yard.estimated_seconds_to_complete
        );
    }

    let _ = writeln!(out, "\nMachines");
    for machine in &report.machines {
        let location = machine
            .current_yard
            .map_or_else(|| "outside".to_string(), |id| format!("yard {id}"));
        let worked: Vec<String> = machine
            .seconds_by_yard
            .keys()
            .map(ToString::to_string)
            .collect();
        let _ = writeln!(
            out,
            "  Machine {}: {} at {}, {} messages, yards worked: {}",
            machine.machine_id,
            location,
            machine.position,
            machine.messages_accepted,
            if worked.is_empty() {
                "none".to_string()
            } else {
                worked.join(", ")
            }
        );
    }

    let _ = writeln!(out, "\nStatus changes");
    let mut by_yard: BTreeMap<YardId, Vec<&YardTransition>> = BTreeMap::new();
    for transition in &report.transitions {
        by_yard.entry(transition.yard_id).or_default().push(transition);
    }
    if by_yard.is_empty() {
        let _ = writeln!(out, "  none");
    }
    for (yard_id, transitions) in by_yard {
        let _ = writeln!(out, "  Yard {yard_id}");
        for transition in transitions {
            let _ = writeln!(
                out,
                "    {} {} -> {} (machine {})",
                transition.at.format(TIMESTAMP_FORMAT),
                transition.from,
                transition.to,
                transition.machine_id
            );
        }
    }

    out
}

/// Writes the human-readable summary.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_summary<W: Write>(report: &RunReport, mut writer: W) -> Result<()> {
    writer.write_all(render_summary(report).as_bytes())?;
    Ok(())
}

/// Writes the full report as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_report_json<W: Write>(report: &RunReport, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Writes every report file into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written.
pub fn save_all(report: &RunReport, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let status_path = dir.join("yard_status_changes.csv");
    write_status_changes(report, create(&status_path)?)?;

    let positions_path = dir.join("final_machine_positions.csv");
    write_machine_positions(report, create(&positions_path)?)?;

    let summary_path = dir.join("summary_report.txt");
    write_summary(report, create(&summary_path)?)?;

    let json_path = dir.join("run_report.json");
    write_report_json(report, create(&json_path)?)?;

    info!(
        transitions = report.transitions.len(),
        completed = report.completed_yards(),
        "Reports written to {}",
        dir.display()
    );
    Ok(vec![status_path, positions_path, summary_path, json_path])
}

fn create(path: &Path) -> Result<std::io::BufWriter<std::fs::File>> {
    Ok(std::io::BufWriter::new(std::fs::File::create(path)?))
}

/// Yards grouped by final status, lowest first.
pub fn yards_by_status(report: &RunReport) -> BTreeMap<CleaningStatus, Vec<YardId>> {
    let mut grouped: BTreeMap<CleaningStatus, Vec<YardId>> = BTreeMap::new();
    for yard in &report.yards {
        grouped.entry(yard.status).or_default().push(yard.yard_id);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use yardwatch_engine::{MachineSnapshot, RunMode, YardSnapshot};
    use yardwatch_link::StatsSnapshot;
    use yardwatch_model::Coordinate;

    fn at(second: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(second)
    }

    fn yard(yard_id: YardId, cleaned_seconds: f64, status: CleaningStatus) -> YardSnapshot {
        YardSnapshot {
            yard_id,
            area: 100.0,
            cleaning_rate: 1.0,
            cleaned_seconds,
            percentage: cleaned_seconds.min(100.0),
            status,
            cleaned_area: cleaned_seconds.min(100.0),
            remaining_area: (100.0 - cleaned_seconds).max(0.0),
            estimated_seconds_to_complete: (100.0 - cleaned_seconds).max(0.0),
        }
    }

    fn sample() -> RunReport {
        let transition = |yard_id, from, to, second, machine_id| YardTransition {
            yard_id,
            from,
            to,
            at: at(second),
            machine_id,
        };
        RunReport {
            mode: RunMode::Batch,
            transitions: vec![
                transition(1, CleaningStatus::Zero, CleaningStatus::Twenty, 20, 1),
                transition(2, CleaningStatus::Zero, CleaningStatus::Forty, 45, 2),
                transition(1, CleaningStatus::Twenty, CleaningStatus::Complete, 100, 1),
            ],
            machines: vec![
                MachineSnapshot {
                    machine_id: 1,
                    position: Coordinate::new(3.5, -2.25),
                    current_yard: Some(1),
                    last_seen: Some(at(100)),
                    messages_accepted: 6,
                    seconds_by_yard: BTreeMap::from([(1, 100.0)]),
                },
                MachineSnapshot {
                    machine_id: 2,
                    position: Coordinate::new(10.0, 4.0),
                    current_yard: None,
                    last_seen: Some(at(60)),
                    messages_accepted: 4,
                    seconds_by_yard: BTreeMap::from([(2, 45.0)]),
                },
            ],
            yards: vec![
                yard(1, 100.0, CleaningStatus::Complete),
                yard(2, 45.0, CleaningStatus::Forty),
                yard(3, 0.0, CleaningStatus::Zero),
            ],
            stats: StatsSnapshot {
                generated: 10,
                delivered: 10,
                consumed: 10,
                ..StatsSnapshot::default()
            },
            live: Vec::new(),
            stopped_early: false,
            elapsed_seconds: 0.5,
            fingerprint: 0xabc,
        }
    }

    fn to_text(write: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        write(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn status_changes_csv() {
        let text = to_text(|buffer| write_status_changes(&sample(), buffer));
        insta::assert_snapshot!(text, @r"
        yard_id,from,to,timestamp,machine_id
        1,0,20,2024-05-01T08:00:20.000,1
        2,0,40,2024-05-01T08:00:45.000,2
        1,20,100,2024-05-01T08:01:40.000,1
        ");
    }

    #[test]
    fn machine_positions_csv() {
        let text = to_text(|buffer| write_machine_positions(&sample(), buffer));
        insta::assert_snapshot!(text, @r"
        machine_id,x,y,yard_id,messages_accepted,seconds_worked
        1,3.50,-2.25,1,6,100.0
        2,10.00,4.00,,4,45.0
        ");
    }

    #[test]
    fn empty_report_still_has_headers() {
        let mut report = sample();
        report.transitions.clear();
        report.machines.clear();
        let changes = to_text(|buffer| write_status_changes(&report, buffer));
        assert_eq!(changes.trim(), "yard_id,from,to,timestamp,machine_id");
        let positions = to_text(|buffer| write_machine_positions(&report, buffer));
        assert!(positions.starts_with("machine_id,x,y,yard_id"));
    }

    #[test]
    fn summary_sections() {
        let summary = render_summary(&sample());
        assert!(summary.contains("Mode: batch"));
        assert!(summary.contains("Completed yards: 1"));
        assert!(summary.contains("Partially cleaned yards: 1"));
        assert!(summary.contains("Untouched yards: 1"));
        assert!(summary.contains("Machines outside: 1"));
        assert!(summary.contains("Yards by status: 0%: 1, 40%: 1, 100%: 1"));
        assert!(summary.contains(
            "Yard 2: 45.0% (45.0/100.0 cleaned, 55.0 remaining), status 40%, 45.0 s worked, 55.0 s to complete"
        ));
        assert!(summary.contains("Average completion: 48.3%"));
        assert!(summary.contains("Cleaning efficiency: 48.3%"));
        assert!(summary.contains("Machine 2: outside"));
        assert!(summary.contains("Reliability: 100.0%"));
        let yard_one = summary.find("  Yard 1\n").unwrap();
        let yard_two = summary.find("  Yard 2\n").unwrap();
        assert!(yard_one < yard_two);
    }

    #[test]
    fn report_json_round_trips() {
        let report = sample();
        let text = to_text(|buffer| write_report_json(&report, buffer));
        let parsed: RunReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn grouping_by_status() {
        let grouped = yards_by_status(&sample());
        assert_eq!(grouped[&CleaningStatus::Complete], vec![1]);
        assert_eq!(grouped[&CleaningStatus::Zero], vec![3]);
    }
}
