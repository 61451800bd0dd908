//! Engine and run configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use yardwatch_link::LinkConfig;

/// Upper bound on consumer workers.
const MAX_WORKERS: usize = 64;

/// When accumulated machine time is credited to a yard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// After every accumulation, so a threshold fires at the message that
    /// reached it.
    #[default]
    Eager,
    /// Only when the machine leaves the yard and at stream end.
    OnYardExit,
}

/// Consumer-side settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Emit a live snapshot every N consumed messages.
    pub report_every_n_messages: u64,
    /// How far behind a machine's last-seen time a message may be before it
    /// is rejected as stale.
    pub stale_tolerance_seconds: f64,
    /// Largest gap between two messages that still counts as work.
    pub max_step_seconds: f64,
    /// Number of consumer workers.
    pub workers: usize,
    /// When machine time is credited to yards.
    pub flush_policy: FlushPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            report_every_n_messages: 5,
            stale_tolerance_seconds: 10.0,
            max_step_seconds: 3600.0,
            workers: 1,
            flush_policy: FlushPolicy::Eager,
        }
    }
}

impl EngineConfig {
    /// Sets the reporting interval.
    #[must_use]
    pub const fn with_report_every(mut self, messages: u64) -> Self {
        self.report_every_n_messages = messages;
        self
    }

    /// Sets the stale tolerance.
    #[must_use]
    pub const fn with_stale_tolerance(mut self, seconds: f64) -> Self {
        self.stale_tolerance_seconds = seconds;
        self
    }

    /// Sets the largest plausible step.
    #[must_use]
    pub const fn with_max_step(mut self, seconds: f64) -> Self {
        self.max_step_seconds = seconds;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the flush policy.
    #[must_use]
    pub const fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Checks that every field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.report_every_n_messages == 0 {
            return Err(Error::InvalidConfig(
                "report_every_n_messages must be at least 1".to_string(),
            ));
        }
        if !self.stale_tolerance_seconds.is_finite() || self.stale_tolerance_seconds < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "stale_tolerance_seconds must be a finite non-negative number, got {}",
                self.stale_tolerance_seconds
            )));
        }
        if !self.max_step_seconds.is_finite() || self.max_step_seconds <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_step_seconds must be positive, got {}",
                self.max_step_seconds
            )));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(Error::InvalidConfig(format!(
                "workers must be between 1 and {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        Ok(())
    }
}

/// Everything a realtime run needs besides its inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Simulated link.
    pub link: LinkConfig,
    /// Consumer side.
    pub engine: EngineConfig,
}

impl RunConfig {
    /// Validates both halves.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.link.validate()?;
        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.report_every_n_messages, 5);
        assert_eq!(config.engine.flush_policy, FlushPolicy::Eager);
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"engine": {"workers": 3, "flush_policy": "on_yard_exit"},
                "link": {"impairment": {"seed": 7}}}"#,
        )
        .unwrap();
        assert_eq!(config.engine.workers, 3);
        assert_eq!(config.engine.flush_policy, FlushPolicy::OnYardExit);
        assert!((config.engine.max_step_seconds - 3600.0).abs() < f64::EPSILON);
        assert_eq!(config.link.impairment.seed, 7);
        assert!((config.link.impairment.loss_probability - 0.06).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_bad_engine_values() {
        assert!(EngineConfig::default().with_workers(0).validate().is_err());
        assert!(EngineConfig::default().with_report_every(0).validate().is_err());
        assert!(EngineConfig::default().with_max_step(0.0).validate().is_err());
        assert!(EngineConfig::default()
            .with_stale_tolerance(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn link_errors_surface() {
        let mut config = RunConfig::default();
        config.link.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(Error::Link(_))));
    }
}
