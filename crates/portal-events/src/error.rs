use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Debug, Clone, Error)]
pub enum EventError {
    #[error("event serialization failed: {0}")]
    Serialization(String),
    #[error("event publish failed: {0}")]
    Publish(String),
    #[error("event consumption failed: {0}")]
    Consume(String),
    #[error("event operation timed out: {0}")]
    Timeout(String),
}
