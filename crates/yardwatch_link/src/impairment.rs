//! Impairment model for the simulated link.
//!
//! Decides, per message, whether it is lost, how long its delivery is
//! deferred and whether its coordinates arrive corrupted. The model holds
//! only configuration; randomness is passed in so the caller owns the one
//! seeded generator of the run.

use crate::config::ImpairmentConfig;
use crate::error::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use yardwatch_model::{Coordinate, Message};

/// Largest per-axis shift of an [`CorruptionKind::Offset`] fault.
const OFFSET_SPAN: f64 = 8.0;
/// Largest per-axis shift of a [`CorruptionKind::Noise`] fault.
const NOISE_SPAN: f64 = 4.0;

/// Ways a coordinate pair can be damaged in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorruptionKind {
    /// Both axes shifted by up to ±8 units.
    Offset,
    /// Both axes shifted by up to ±4 units.
    Noise,
    /// Axes transposed.
    Swap,
}

impl CorruptionKind {
    /// Every kind, selected uniformly.
    pub const ALL: [Self; 3] = [Self::Offset, Self::Noise, Self::Swap];

    /// Applies this fault to a coordinate.
    pub fn apply<R: Rng + ?Sized>(self, position: Coordinate, rng: &mut R) -> Coordinate {
        let damaged = match self {
            Self::Offset => shift(position, OFFSET_SPAN, rng),
            Self::Noise => shift(position, NOISE_SPAN, rng),
            Self::Swap => position.swapped(),
        };
        Coordinate::new(round2(damaged.x), round2(damaged.y))
    }
}

fn shift<R: Rng + ?Sized>(position: Coordinate, span: f64, rng: &mut R) -> Coordinate {
    Coordinate::new(
        position.x + rng.gen_range(-span..=span),
        position.y + rng.gen_range(-span..=span),
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A message that survived the link.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The message as it will arrive (possibly corrupted).
    pub message: Message,
    /// Deferred delivery delay; zero means deliver inline.
    pub delay: Duration,
    /// Corruption applied, if any.
    pub corruption: Option<CorruptionKind>,
}

/// Outcome of pushing one message through the link.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The message is lost.
    Drop,
    /// The message arrives, possibly late and corrupted.
    Deliver(Delivery),
}

/// Pure decision functions over a fixed [`ImpairmentConfig`].
#[derive(Debug, Clone)]
pub struct ImpairmentModel {
    config: ImpairmentConfig,
}

impl ImpairmentModel {
    /// Creates a model after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a probability or the delay bound is out of range.
    pub fn new(config: ImpairmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &ImpairmentConfig {
        &self.config
    }

    /// Bernoulli draw at the loss probability.
    pub fn should_drop<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.config.loss_probability)
    }

    /// Uniform delay in `[0, max_delay_seconds]`, at millisecond resolution.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.config.max_delay_seconds <= 0.0 {
            return Duration::ZERO;
        }
        let seconds = rng.gen_range(0.0..=self.config.max_delay_seconds);
        // Non-negative and bounded by the validated maximum.
        Duration::from_millis((seconds * 1000.0).round() as u64)
    }

    /// With the error probability, returns a new message with damaged
    /// coordinates; otherwise returns the input unchanged.
    pub fn maybe_corrupt<R: Rng + ?Sized>(
        &self,
        message: Message,
        rng: &mut R,
    ) -> (Message, Option<CorruptionKind>) {
        if !rng.gen_bool(self.config.error_probability) {
            return (message, None);
        }
        let kind = CorruptionKind::ALL[rng.gen_range(0..CorruptionKind::ALL.len())];
        let corrupted = message.with_position(kind.apply(message.position, rng));
        (corrupted, Some(kind))
    }

    /// Applies loss, then delay, then corruption.
    pub fn decide<R: Rng + ?Sized>(&self, message: Message, rng: &mut R) -> Verdict {
        if self.should_drop(rng) {
            return Verdict::Drop;
        }
        let delay = self.delay_for(rng);
        let (message, corruption) = self.maybe_corrupt(message, rng);
        Verdict::Deliver(Delivery {
            message,
            delay,
            corruption,
        })
    }
}
