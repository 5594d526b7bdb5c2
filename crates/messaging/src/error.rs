//! Messaging error types.

use thiserror::Error;

use crate::topic::Topic;

/// Errors that can occur while publishing or handling events.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Payload serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The delivery lane for a topic has shut down.
    #[error("Channel closed for topic {0}")]
    ChannelClosed(Topic),

    /// A consumer failed to process a delivered event.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl MessagingError {
    /// Wraps a consumer-side failure.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        MessagingError::Handler(err.to_string())
    }
}

/// Convenience type alias for messaging results.
pub type Result<T> = std::result::Result<T, MessagingError>;
