//! Yard directory and message dataset loading.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};
use yardwatch_model::{Coordinate, Location, Message, YardDirectory, YardId, YardSpec};

/// Loads the yard directory from a `yard_id,area,cleaning_rate` text file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or holds no valid yard.
pub fn load_yards(path: impl AsRef<Path>) -> Result<YardDirectory> {
    let path = path.as_ref();
    info!("Loading yards from {}", path.display());
    parse_yards(std::fs::File::open(path)?)
}

/// Parses a yard directory.
///
/// Blank lines and `#` comments are ignored. Malformed or duplicate lines
/// are skipped with a warning.
///
/// # Errors
///
/// Returns [`Error::NoYards`] if no line yields a valid yard.
pub fn parse_yards<R: Read>(reader: R) -> Result<YardDirectory> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut yards = Vec::new();
    let mut seen = HashSet::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "unreadable yard line skipped");
                continue;
            }
        };
        let line = record.position().map_or(0, csv::Position::line);
        match parse_yard(&record) {
            Ok(spec) if seen.insert(spec.id) => yards.push(spec),
            Ok(spec) => warn!(line, yard_id = spec.id, "duplicate yard skipped"),
            Err(reason) => warn!(line, %reason, "malformed yard line skipped"),
        }
    }

    if yards.is_empty() {
        return Err(Error::NoYards);
    }
    info!(yards = yards.len(), "yard directory loaded");
    Ok(YardDirectory::new(yards)?)
}

fn parse_yard(record: &csv::StringRecord) -> std::result::Result<YardSpec, String> {
    if record.len() != 3 {
        return Err(format!("expected 3 fields, got {}", record.len()));
    }
    let id: YardId = record[0]
        .parse()
        .map_err(|_| format!("invalid yard id {:?}", &record[0]))?;
    let area: f64 = record[1]
        .parse()
        .map_err(|_| format!("invalid area {:?}", &record[1]))?;
    let rate: f64 = record[2]
        .parse()
        .map_err(|_| format!("invalid cleaning rate {:?}", &record[2]))?;
    YardSpec::new(id, area, rate).map_err(|e| e.to_string())
}

/// Loads a message dataset from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a message list.
pub fn load_messages(path: impl AsRef<Path>) -> Result<Vec<Message>> {
    let path = path.as_ref();
    info!("Loading messages from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_messages(&content)
}

/// Parses a message dataset.
///
/// The document can contain:
/// - A JSON array of message objects
/// - A JSON object with a "messages" field containing the array
///
/// Records are never dropped here. Fields that are absent or of the wrong
/// type become missing and the engine rejects the message later:
/// `yard_id: null` means outside every yard, an absent `yard_id` means no
/// location, and a missing `sequence` is replaced by the record's index.
///
/// # Errors
///
/// Returns an error if the content is not JSON or not a message list.
pub fn parse_messages(content: &str) -> Result<Vec<Message>> {
    let records = match serde_json::from_str::<Value>(content)? {
        Value::Array(records) => records,
        Value::Object(mut document) => match document.remove("messages") {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(Error::InvalidFormat(
                    "object has no \"messages\" array".to_string(),
                ))
            }
        },
        _ => {
            return Err(Error::InvalidFormat(
                "expected an array or an object with a \"messages\" array".to_string(),
            ))
        }
    };

    let messages: Vec<Message> = records
        .iter()
        .enumerate()
        .map(|(index, record)| message_from_record(index, record))
        .collect();

    let incomplete = messages
        .iter()
        .filter(|m| m.machine_id.is_none() || m.timestamp.is_none() || m.location.is_none())
        .count();
    info!(messages = messages.len(), incomplete, "messages loaded");
    Ok(messages)
}

fn message_from_record(index: usize, record: &Value) -> Message {
    let sequence = record
        .get("sequence")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| u64::try_from(index).unwrap_or(u64::MAX));

    let machine_id = record
        .get("machine_id")
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok());

    let timestamp = record
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                debug!(sequence, raw, "unparsable timestamp");
            }
            parsed
        });

    let axis = |name: &str| record.get(name).and_then(Value::as_f64).unwrap_or(f64::NAN);

    let location = match record.get("yard_id") {
        None => None,
        Some(Value::Null) => Some(Location::Outside),
        Some(value) => value
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .map(Location::Yard),
    };

    Message {
        sequence,
        machine_id,
        timestamp,
        position: Coordinate::new(axis("x"), axis("y")),
        location,
    }
}

/// Parses an ISO 8601 timestamp, with or without fractional seconds or an
/// offset. Offsets are converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
