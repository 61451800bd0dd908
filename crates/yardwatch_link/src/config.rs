//! Link configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Probabilities and bounds for injected transmission faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpairmentConfig {
    /// Probability that a message never arrives (0.0 - 1.0).
    pub loss_probability: f64,
    /// Probability that a delivered message carries corrupted coordinates
    /// (0.0 - 1.0).
    pub error_probability: f64,
    /// Upper bound of the uniform delivery delay, in seconds.
    pub max_delay_seconds: f64,
    /// Seed for the run's random source.
    pub seed: u64,
}

impl Default for ImpairmentConfig {
    fn default() -> Self {
        Self {
            loss_probability: 0.06,
            error_probability: 0.015,
            max_delay_seconds: 2.0,
            seed: 42,
        }
    }
}

impl ImpairmentConfig {
    /// A perfect link: nothing lost, delayed or corrupted.
    #[must_use]
    pub const fn lossless() -> Self {
        Self {
            loss_probability: 0.0,
            error_probability: 0.0,
            max_delay_seconds: 0.0,
            seed: 42,
        }
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the loss probability.
    #[must_use]
    pub const fn with_loss_probability(mut self, probability: f64) -> Self {
        self.loss_probability = probability;
        self
    }

    /// Sets the coordinate error probability.
    #[must_use]
    pub const fn with_error_probability(mut self, probability: f64) -> Self {
        self.error_probability = probability;
        self
    }

    /// Sets the maximum delivery delay.
    #[must_use]
    pub const fn with_max_delay_seconds(mut self, seconds: f64) -> Self {
        self.max_delay_seconds = seconds;
        self
    }

    /// Checks that probabilities and bounds are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        check_probability("loss_probability", self.loss_probability)?;
        check_probability("error_probability", self.error_probability)?;
        if !self.max_delay_seconds.is_finite() || self.max_delay_seconds < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_delay_seconds must be a finite non-negative number, got {}",
                self.max_delay_seconds
            )));
        }
        Ok(())
    }
}

/// Emission pacing of the replay driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Nominal gap between two transmissions, in seconds.
    pub nominal_interval_seconds: f64,
    /// Replay speed; 2.0 halves every gap.
    pub speed_multiplier: f64,
    /// Relative random spread of each gap (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            nominal_interval_seconds: 1.0,
            speed_multiplier: 1.0,
            jitter: 0.2,
        }
    }
}

impl PacingConfig {
    /// Sets the speed multiplier.
    #[must_use]
    pub const fn with_speed(mut self, speed: f64) -> Self {
        self.speed_multiplier = speed;
        self
    }

    /// Sets the jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Gap between transmissions before jitter.
    #[must_use]
    ///
    /// Saturates at [`Duration::MAX`]; [`PacingConfig::validate`] refuses
    /// settings that would get there.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.nominal_interval_seconds / self.speed_multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Checks that the pacing is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !self.nominal_interval_seconds.is_finite() || self.nominal_interval_seconds < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "nominal_interval_seconds must be a finite non-negative number, got {}",
                self.nominal_interval_seconds
            )));
        }
        if !self.speed_multiplier.is_finite() || self.speed_multiplier <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "speed_multiplier must be positive, got {}",
                self.speed_multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(Error::InvalidConfig(format!(
                "jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        // The longest jittered gap must still fit in a Duration.
        let longest = self.nominal_interval_seconds / self.speed_multiplier * (1.0 + self.jitter);
        if Duration::try_from_secs_f64(longest).is_err() {
            return Err(Error::InvalidConfig(format!(
                "nominal_interval_seconds / speed_multiplier is too large ({} / {})",
                self.nominal_interval_seconds, self.speed_multiplier
            )));
        }
        Ok(())
    }
}

/// Full configuration of the simulated link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Fault injection.
    pub impairment: ImpairmentConfig,
    /// Emission pacing.
    pub pacing: PacingConfig,
    /// Number of messages the channel buffers before senders wait.
    pub channel_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            impairment: ImpairmentConfig::default(),
            pacing: PacingConfig::default(),
            channel_capacity: 64,
        }
    }
}

impl LinkConfig {
    /// Replaces the impairment settings.
    #[must_use]
    pub fn with_impairment(mut self, impairment: ImpairmentConfig) -> Self {
        self.impairment = impairment;
        self
    }

    /// Replaces the pacing settings.
    #[must_use]
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sets the channel capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.impairment.validate()?;
        self.pacing.validate()?;
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}
