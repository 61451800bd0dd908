//! Error types for the cleaning state engine.

use thiserror::Error;

/// Errors that stop a run before or while it executes.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine configuration is out of range.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The telemetry link could not be set up.
    #[error("link error: {0}")]
    Link(#[from] yardwatch_link::Error),

    /// Model values could not be built.
    #[error("model error: {0}")]
    Model(#[from] yardwatch_model::Error),

    /// A pipeline task panicked or was cancelled.
    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
