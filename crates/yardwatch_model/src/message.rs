//! Position reports sent by cleaning machines.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a cleaning machine.
pub type MachineId = u32;
/// Identifier of a yard in the directory.
pub type YardId = u32;

/// Planar coordinate reported by a machine's positioning sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
}

impl Coordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the coordinate with its axes exchanged.
    #[must_use]
    pub const fn swapped(self) -> Self {
        Self {
            x: self.y,
            y: self.x,
        }
    }

    /// Returns true if both axes are finite numbers.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Where a machine says it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    /// Inside the given yard.
    Yard(YardId),
    /// Between yards (the dataset carries an explicit null).
    Outside,
}

impl Location {
    /// Returns the yard id, if inside a yard.
    #[must_use]
    pub const fn yard(self) -> Option<YardId> {
        match self {
            Self::Yard(id) => Some(id),
            Self::Outside => None,
        }
    }
}

impl From<Option<YardId>> for Location {
    fn from(value: Option<YardId>) -> Self {
        value.map_or(Self::Outside, Self::Yard)
    }
}

/// A single transmission attempt from a machine.
///
/// Fields that the link or the dataset may lose are optional; the engine
/// rejects messages that miss a required one. A message is never mutated in
/// place: impairments build a new value with [`Message::with_position`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonically increasing sequence number assigned by the dataset.
    pub sequence: u64,
    /// Sending machine.
    pub machine_id: Option<MachineId>,
    /// Time the machine sent the report.
    pub timestamp: Option<NaiveDateTime>,
    /// Reported position.
    pub position: Coordinate,
    /// Target yard, `None` when the field was absent.
    pub location: Option<Location>,
}

impl Message {
    /// Creates a fully populated message for a machine inside a yard.
    #[must_use]
    pub const fn new(
        sequence: u64,
        machine_id: MachineId,
        timestamp: NaiveDateTime,
        position: Coordinate,
        yard_id: YardId,
    ) -> Self {
        Self {
            sequence,
            machine_id: Some(machine_id),
            timestamp: Some(timestamp),
            position,
            location: Some(Location::Yard(yard_id)),
        }
    }

    /// Returns a copy of this message with a different location.
    #[must_use]
    pub const fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Returns a copy of this message reporting a different position.
    #[must_use]
    pub fn with_position(&self, position: Coordinate) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    /// Returns the yard id when the message targets a yard.
    #[must_use]
    pub fn yard_id(&self) -> Option<YardId> {
        self.location.and_then(Location::yard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, sec)
            .unwrap()
    }

    #[test]
    fn with_position_leaves_original_untouched() {
        let original = Message::new(1, 7, ts(0), Coordinate::new(1.0, 2.0), 3);
        let moved = original.with_position(Coordinate::new(5.0, 6.0));

        assert_eq!(original.position, Coordinate::new(1.0, 2.0));
        assert_eq!(moved.position, Coordinate::new(5.0, 6.0));
        assert_eq!(moved.sequence, original.sequence);
        assert_eq!(moved.yard_id(), Some(3));
    }

    #[test]
    fn location_from_optional_yard() {
        assert_eq!(Location::from(Some(4)), Location::Yard(4));
        assert_eq!(Location::from(None), Location::Outside);
        assert_eq!(Location::Outside.yard(), None);
    }

    #[test]
    fn coordinate_swap_and_finiteness() {
        let c = Coordinate::new(1.5, -3.0);
        assert_eq!(c.swapped(), Coordinate::new(-3.0, 1.5));
        assert!(c.is_finite());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_finite());
    }
}
