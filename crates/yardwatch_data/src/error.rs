//! Error types for dataset and report I/O.

use thiserror::Error;

/// Errors that can occur while reading inputs or writing reports.
#[derive(Debug, Error)]
pub enum Error {
    /// The yard file held no usable yard.
    #[error("no valid yard in directory file")]
    NoYards,

    /// The message file is JSON but not a message list.
    #[error("invalid message file: {0}")]
    InvalidFormat(String),

    /// Model values could not be built.
    #[error(transparent)]
    Model(#[from] yardwatch_model::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON parsing or writing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// CSV parsing or writing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Result type alias for data operations.
pub type Result<T> = std::result::Result<T, Error>;
