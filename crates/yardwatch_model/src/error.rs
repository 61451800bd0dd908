//! Error types for the yard model.

use thiserror::Error;

/// Errors raised while building model values.
#[derive(Debug, Error)]
pub enum Error {
    /// A yard entry has invalid parameters.
    #[error("invalid yard {yard_id}: {reason}")]
    InvalidYard {
        /// Offending yard identifier.
        yard_id: u32,
        /// Why the entry was refused.
        reason: String,
    },

    /// The same yard identifier appears twice in a directory.
    #[error("duplicate yard id {0}")]
    DuplicateYard(u32),

    /// A directory must contain at least one yard.
    #[error("yard directory is empty")]
    EmptyDirectory,
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;
