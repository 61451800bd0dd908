//! Error types for the telemetry link.

use thiserror::Error;
use yardwatch_model::Message;

/// Errors that can occur on the link.
#[derive(Debug, Error)]
pub enum Error {
    /// Link configuration is out of range.
    #[error("invalid link configuration: {0}")]
    InvalidConfig(String),

    /// The channel was closed; the rejected message is handed back.
    #[error("channel closed (message #{})", .0.sequence)]
    ChannelClosed(Box<Message>),
}

/// Result type alias for link operations.
pub type Result<T> = std::result::Result<T, Error>;
