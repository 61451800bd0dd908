//! Domain model for yard cleaning telemetry.
//!
//! This crate provides:
//! - Position reports (`Message`) as transmitted by cleaning machines
//! - The yard directory and per-yard cleaning progress
//! - The discrete cleaning status ladder (0, 20, 40, 60, 80, 100 percent)
//!
//! # Example
//!
//! ```rust,ignore
//! use yardwatch_model::{CleaningStatus, Yard, YardSpec};
//!
//! let mut yard = Yard::new(YardSpec::new(1, 100.0, 1.0)?);
//! let change = yard.credit(80.0);
//! assert_eq!(change, Some((CleaningStatus::Zero, CleaningStatus::Eighty)));
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod directory;
pub mod error;
pub mod message;
pub mod yard;

pub use directory::YardDirectory;
pub use error::{Error, Result};
pub use message::{Coordinate, Location, MachineId, Message, YardId};
pub use yard::{CleaningStatus, Yard, YardSpec};
