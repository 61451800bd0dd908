//! Simulated telemetry link between cleaning machines and the tracker.
//!
//! This crate provides:
//! - A seeded impairment model (loss, delivery delay, coordinate corruption)
//! - A bounded, ordered, closable hand-off channel with backpressure
//! - A paced replay driver that pushes a recorded message set through both
//! - Run-wide transmission statistics shared by producer and consumers
//!
//! # Determinism
//!
//! Every random decision is drawn from one `ChaCha8Rng` seeded from the
//! configuration and threaded explicitly through the replay loop, so the
//! same seed and message order always produce the same impairments.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use yardwatch_link::{Channel, LinkConfig, LinkStats, ReplayDriver};
//!
//! let config = LinkConfig::default();
//! let channel = Arc::new(Channel::new(config.channel_capacity)?);
//! let stats = Arc::new(LinkStats::new());
//! let driver = ReplayDriver::new(messages, &config, Arc::clone(&stats))?;
//! tokio::spawn(driver.run(Arc::clone(&channel)));
//! while let Some(message) = channel.receive().await {
//!     // ...
//! }
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod channel;
pub mod config;
pub mod error;
pub mod impairment;
pub mod producer;
pub mod stats;

pub use channel::Channel;
pub use config::{ImpairmentConfig, LinkConfig, PacingConfig};
pub use error::{Error, Result};
pub use impairment::{CorruptionKind, Delivery, ImpairmentModel, Verdict};
pub use producer::{ReplayDriver, ReplaySummary, StopHandle};
pub use stats::{LinkStats, StatsSnapshot};
