use thiserror::Error;

use courier_common::error::AppError;

/// Failures of the queue store backend itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Queue store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the consumer, the dead-letter manager and the producer.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Replay count must be at least 1")]
    InvalidReplayCount,

    #[error("Consumer is already running")]
    AlreadyRunning,
}

impl From<NotifierError> for AppError {
    fn from(err: NotifierError) -> Self {
        match err {
            NotifierError::Store(StoreError::Redis(e)) => AppError::Redis(e),
            NotifierError::Serialization(e) => AppError::Serialization(e),
            invalid @ NotifierError::InvalidReplayCount => AppError::Validation(invalid.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}
