//! Queue error types.

use thiserror::Error;

/// Errors produced by the work queue facade.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to queue: {0}")]
    Connect(String),

    #[error("queue setup error: {0}")]
    Setup(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("consume error: {0}")]
    Consume(String),

    #[error("malformed message payload: {0}")]
    MalformedPayload(String),

    #[error("queue unhealthy: {0}")]
    Unhealthy(String),
}

/// Result type alias for queue operations.
pub type QueueResult<T> = std::result::Result<T, QueueError>;
