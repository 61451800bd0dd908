//! Message validation.
//!
//! Checks run in a fixed order and the first failure wins: machine id,
//! location, yard membership, timestamp, coordinates. Staleness depends on
//! per-machine state and is checked by the machine book afterwards.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use yardwatch_model::{Coordinate, Location, MachineId, Message, YardDirectory, YardId};

/// Why a delivered message was excluded from state updates.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum Rejection {
    /// No machine id.
    #[error("missing machine id")]
    MissingMachine,

    /// Machine id zero.
    #[error("invalid machine id {0}")]
    InvalidMachine(MachineId),

    /// No location field at all.
    #[error("missing yard id")]
    MissingLocation,

    /// Yard id not listed in the directory.
    #[error("unknown yard {0}")]
    UnknownYard(YardId),

    /// Timestamp absent or unparsable.
    #[error("missing or unparsable timestamp")]
    MissingTimestamp,

    /// Coordinates are NaN or infinite.
    #[error("non-finite coordinates")]
    NonFiniteCoordinates,

    /// Older than the machine's last-seen time by more than the tolerance.
    #[error("stale message at {timestamp}, machine last seen at {last_seen}")]
    Stale {
        /// Message timestamp.
        timestamp: NaiveDateTime,
        /// Machine's latest accepted timestamp.
        last_seen: NaiveDateTime,
    },
}

/// A message whose required fields are present and well formed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidMessage {
    /// Dataset sequence number.
    pub sequence: u64,
    /// Sending machine.
    pub machine_id: MachineId,
    /// Sending time.
    pub timestamp: NaiveDateTime,
    /// Reported position.
    pub position: Coordinate,
    /// Yard the machine is in, `None` when outside every yard.
    pub yard: Option<YardId>,
}

/// Runs the stateless checks against the directory.
///
/// # Errors
///
/// Returns the first [`Rejection`] that applies.
pub fn validate(message: &Message, directory: &YardDirectory) -> Result<ValidMessage, Rejection> {
    let machine_id = message.machine_id.ok_or(Rejection::MissingMachine)?;
    if machine_id == 0 {
        return Err(Rejection::InvalidMachine(machine_id));
    }

    let yard = match message.location.ok_or(Rejection::MissingLocation)? {
        Location::Yard(id) if directory.contains(id) => Some(id),
        Location::Yard(id) => return Err(Rejection::UnknownYard(id)),
        Location::Outside => None,
    };

    let timestamp = message.timestamp.ok_or(Rejection::MissingTimestamp)?;

    if !message.position.is_finite() {
        return Err(Rejection::NonFiniteCoordinates);
    }

    Ok(ValidMessage {
        sequence: message.sequence,
        machine_id,
        timestamp,
        position: message.position,
        yard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use yardwatch_model::YardSpec;

    fn directory() -> YardDirectory {
        YardDirectory::new(vec![
            YardSpec::new(1, 100.0, 1.0).unwrap(),
            YardSpec::new(2, 200.0, 2.0).unwrap(),
        ])
        .unwrap()
    }

    fn good() -> Message {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Message::new(4, 3, ts, Coordinate::new(1.0, 2.0), 2)
    }

    #[test]
    fn accepts_well_formed_message() {
        let valid = validate(&good(), &directory()).unwrap();
        assert_eq!(valid.machine_id, 3);
        assert_eq!(valid.yard, Some(2));
        assert_eq!(valid.sequence, 4);
    }

    #[test]
    fn outside_is_a_valid_location() {
        let message = good().with_location(Some(Location::Outside));
        assert_eq!(validate(&message, &directory()).unwrap().yard, None);
    }

    #[test]
    fn rejects_in_order() {
        let dir = directory();

        let mut message = good();
        message.machine_id = None;
        message.location = None;
        assert_eq!(validate(&message, &dir), Err(Rejection::MissingMachine));

        message.machine_id = Some(0);
        assert_eq!(validate(&message, &dir), Err(Rejection::InvalidMachine(0)));

        message.machine_id = Some(3);
        assert_eq!(validate(&message, &dir), Err(Rejection::MissingLocation));

        message.location = Some(Location::Yard(9));
        message.timestamp = None;
        assert_eq!(validate(&message, &dir), Err(Rejection::UnknownYard(9)));

        message.location = Some(Location::Yard(1));
        assert_eq!(validate(&message, &dir), Err(Rejection::MissingTimestamp));

        message.timestamp = good().timestamp;
        message.position = Coordinate::new(f64::INFINITY, 0.0);
        assert_eq!(
            validate(&message, &dir),
            Err(Rejection::NonFiniteCoordinates)
        );
    }
}
