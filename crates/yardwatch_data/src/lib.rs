//! Inputs and outputs around the Yardwatch engine.
//!
//! - Yard directory and message dataset loaders
//! - A seeded synthetic dataset generator
//! - CSV, text and JSON report writers

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod loader;
pub mod synthetic;
pub mod writer;

pub use error::{Error, Result};
pub use loader::{load_messages, load_yards, parse_messages, parse_timestamp, parse_yards};
pub use synthetic::{SyntheticConfig, SyntheticDataset, SyntheticGenerator};
pub use writer::{
    render_summary, save_all, write_machine_positions, write_report_json, write_status_changes,
    write_summary, yards_by_status,
};
