use crate::error::StorageError;
use crate::link::ShortLink;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use std::sync::Arc;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A read-only view of the link store.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the link for a given short code.
    ///
    /// Soft-deleted links are returned too (with `deleted_at` set) so callers
    /// can tell an expired link from one that never existed.
    async fn find(&self, code: &ShortCode) -> Result<Option<ShortLink>>;

    /// Checks whether a short code was ever issued, deleted links included.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;
}

/// The authoritative link store.
#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new link. Returns `Err(Conflict)` if the code already exists.
    ///
    /// The uniqueness check and the write are a single atomic step.
    async fn insert(&self, link: &ShortLink) -> Result<()>;

    /// Soft-deletes a link. Returns `true` if an active link was marked.
    async fn mark_deleted(&self, code: &ShortCode, at: Timestamp) -> Result<bool>;

    /// Adds `by` to the link's hit counter. Unknown codes are ignored.
    async fn increment_hits(&self, code: &ShortCode, by: u64) -> Result<()>;

    /// Soft-deletes up to `limit` active links whose expiry is at or before
    /// `now` and returns their codes.
    async fn sweep_expired(&self, now: Timestamp, limit: usize) -> Result<Vec<ShortCode>>;

    /// Physically removes links soft-deleted before `before`.
    /// Returns the number of removed rows.
    async fn purge_deleted(&self, before: Timestamp) -> Result<u64>;
}

#[async_trait]
impl<T: ReadRepository + ?Sized> ReadRepository for Arc<T> {
    async fn find(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        (**self).find(code).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        (**self).exists(code).await
    }
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn insert(&self, link: &ShortLink) -> Result<()> {
        (**self).insert(link).await
    }

    async fn mark_deleted(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        (**self).mark_deleted(code, at).await
    }

    async fn increment_hits(&self, code: &ShortCode, by: u64) -> Result<()> {
        (**self).increment_hits(code, by).await
    }

    async fn sweep_expired(&self, now: Timestamp, limit: usize) -> Result<Vec<ShortCode>> {
        (**self).sweep_expired(now, limit).await
    }

    async fn purge_deleted(&self, before: Timestamp) -> Result<u64> {
        (**self).purge_deleted(before).await
    }
}
