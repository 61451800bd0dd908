//! Yards and their cleaning progress.

use crate::error::{Error, Result};
use crate::message::YardId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absorbs floating-point drift when accumulated time lands on a threshold.
const PERCENT_EPSILON: f64 = 1e-9;

/// Discrete cleaning status of a yard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum CleaningStatus {
    /// Less than 20% cleaned.
    #[default]
    Zero,
    /// At least 20% cleaned.
    Twenty,
    /// At least 40% cleaned.
    Forty,
    /// At least 60% cleaned.
    Sixty,
    /// At least 80% cleaned.
    Eighty,
    /// Fully cleaned. Terminal.
    Complete,
}

impl CleaningStatus {
    /// Every status in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Zero,
        Self::Twenty,
        Self::Forty,
        Self::Sixty,
        Self::Eighty,
        Self::Complete,
    ];

    /// Maps a completion percentage onto the status ladder (floor to a
    /// multiple of 20).
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        let p = percentage + PERCENT_EPSILON;
        if p >= 100.0 {
            Self::Complete
        } else if p >= 80.0 {
            Self::Eighty
        } else if p >= 60.0 {
            Self::Sixty
        } else if p >= 40.0 {
            Self::Forty
        } else if p >= 20.0 {
            Self::Twenty
        } else {
            Self::Zero
        }
    }

    /// Returns the status as a percentage value.
    #[must_use]
    pub const fn percent(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::Twenty => 20,
            Self::Forty => 40,
            Self::Sixty => 60,
            Self::Eighty => 80,
            Self::Complete => 100,
        }
    }

    /// Returns true for the terminal status.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for CleaningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Static description of a yard, as listed in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YardSpec {
    /// Yard identifier.
    pub id: YardId,
    /// Total area in square metres.
    pub area: f64,
    /// Area cleaned per second of machine work.
    pub cleaning_rate: f64,
}

impl YardSpec {
    /// Creates a validated yard description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidYard`] for a zero id or a non-positive area or
    /// rate.
    pub fn new(id: YardId, area: f64, cleaning_rate: f64) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidYard {
            yard_id: id,
            reason: reason.to_string(),
        };

        if id == 0 {
            return Err(invalid("id must be positive"));
        }
        if !area.is_finite() || area <= 0.0 {
            return Err(invalid("area must be a positive number"));
        }
        if !cleaning_rate.is_finite() || cleaning_rate <= 0.0 {
            return Err(invalid("cleaning rate must be a positive number"));
        }

        Ok(Self {
            id,
            area,
            cleaning_rate,
        })
    }

    /// Seconds of machine work needed to clean the whole yard.
    #[must_use]
    pub fn seconds_to_complete(&self) -> f64 {
        self.area / self.cleaning_rate
    }
}

/// Cleaning progress of one yard over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Yard {
    spec: YardSpec,
    cleaned_seconds: f64,
    status: CleaningStatus,
}

impl Yard {
    /// Creates an untouched yard.
    #[must_use]
    pub const fn new(spec: YardSpec) -> Self {
        Self {
            spec,
            cleaned_seconds: 0.0,
            status: CleaningStatus::Zero,
        }
    }

    /// Returns the static description.
    #[must_use]
    pub const fn spec(&self) -> &YardSpec {
        &self.spec
    }

    /// Returns the yard id.
    #[must_use]
    pub const fn id(&self) -> YardId {
        self.spec.id
    }

    /// Cumulative machine-seconds credited to this yard.
    #[must_use]
    pub const fn cleaned_seconds(&self) -> f64 {
        self.cleaned_seconds
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> CleaningStatus {
        self.status
    }

    /// Cleaned area, capped at the yard area.
    #[must_use]
    pub fn cleaned_area(&self) -> f64 {
        (self.cleaned_seconds * self.spec.cleaning_rate).min(self.spec.area)
    }

    /// Area still to clean.
    #[must_use]
    pub fn remaining_area(&self) -> f64 {
        (self.spec.area - self.cleaned_area()).max(0.0)
    }

    /// Machine-seconds of work still needed at the yard's cleaning rate.
    #[must_use]
    pub fn estimated_seconds_to_complete(&self) -> f64 {
        if self.status.is_complete() {
            return 0.0;
        }
        (self.spec.seconds_to_complete() - self.cleaned_seconds).max(0.0)
    }

    /// Completion percentage in `[0, 100]`.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        (self.cleaned_seconds * self.spec.cleaning_rate * 100.0 / self.spec.area).min(100.0)
    }

    /// Adds machine work time and advances the status if a threshold was
    /// crossed.
    ///
    /// Returns `(old, new)` when the status changed. Non-positive or
    /// non-finite credits are ignored, and a complete yard accepts nothing.
    pub fn credit(&mut self, seconds: f64) -> Option<(CleaningStatus, CleaningStatus)> {
        if self.status.is_complete() || !seconds.is_finite() || seconds <= 0.0 {
            return None;
        }

        self.cleaned_seconds += seconds;
        let computed = CleaningStatus::from_percentage(self.percentage());
        if computed > self.status {
            let old = self.status;
            self.status = computed;
            Some((old, computed))
        } else {
            None
        }
    }
}
