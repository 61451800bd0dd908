//! Cleaning state engine for yard telemetry.
//!
//! This crate turns delivered position reports into cleaning progress:
//! - Validation of delivered messages against the yard directory
//! - A machine book accumulating per-machine working time
//! - A yard ledger applying credited time and recording status transitions
//! - A live reporter for periodic throughput and reliability snapshots
//! - Realtime (impaired link, concurrent workers) and batch orchestration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use yardwatch_engine::{run_realtime, RunConfig};
//!
//! let report = run_realtime(&RunConfig::default(), Arc::new(directory), messages).await?;
//! for transition in &report.transitions {
//!     println!("yard {}: {} -> {}", transition.yard_id, transition.from, transition.to);
//! }
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod machine;
pub mod pipeline;
pub mod reporter;
pub mod result;
pub mod validate;

pub use book::{CreditSink, MachineBook, YardCredit};
pub use config::{EngineConfig, FlushPolicy, RunConfig};
pub use engine::CleaningEngine;
pub use error::{Error, Result};
pub use ledger::{YardLedger, YardTransition};
pub use machine::{Machine, Outcome};
pub use pipeline::{run_batch, run_realtime, Pipeline};
pub use reporter::{LiveReporter, LiveSnapshot};
pub use result::{fingerprint, MachineSnapshot, RunMode, RunReport, YardSnapshot};
pub use validate::{validate, Rejection, ValidMessage};
