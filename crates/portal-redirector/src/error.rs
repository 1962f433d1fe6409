use portal_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedirectError>;

#[derive(Debug, Clone, Error)]
pub enum RedirectError {
    /// Unknown, malformed or explicitly deleted code.
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short link expired: {0}")]
    Expired(String),
    #[error("link store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StorageError> for RedirectError {
    fn from(value: StorageError) -> Self {
        RedirectError::StoreUnavailable(value.to_string())
    }
}
