use portal_core::{CoreError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("short code already taken: {0}")]
    CodeTaken(String),
    /// Every generated candidate collided. Retryable by the caller.
    #[error("no free short code after {0} attempts")]
    GenerationExhausted(usize),
    #[error("short link not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
            CoreError::InvalidUrl(message) => Self::InvalidUrl(message),
            CoreError::InvalidExpiry(message) => Self::InvalidTtl(message),
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Conflict(code) => Self::CodeTaken(code),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}
