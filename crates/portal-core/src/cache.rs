use crate::error::CacheError;
use crate::link::ShortLink;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Prefix of every cache key: `shortlink:{code}`.
pub const CACHE_KEY_PREFIX: &str = "shortlink:";

/// TTL used for links without an expiry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Returns the cache key for a short code.
pub fn cache_key(code: &ShortCode) -> String {
    format!("{CACHE_KEY_PREFIX}{code}")
}

/// Computes how long `link` may stay cached at `now`.
///
/// Links without an expiry get `default_ttl`. Links with an expiry get the
/// remaining whole seconds, capped at `default_ttl`, so a cache entry never
/// outlives its link. Returns `None` for links that must not be cached:
/// deleted, expired, or with less than a second left.
pub fn cache_ttl(link: &ShortLink, now: Timestamp, default_ttl: Duration) -> Option<Duration> {
    if link.is_deleted() {
        return None;
    }

    let Some(expires_at) = link.expires_at else {
        return Some(default_ttl);
    };

    let remaining = Duration::try_from(expires_at.duration_since(now)).ok()?;
    let remaining = Duration::from_secs(remaining.as_secs());
    if remaining.is_zero() {
        return None;
    }

    Some(remaining.min(default_ttl))
}

/// A cache of [`ShortLink`]s keyed by [`ShortCode`].
///
/// The cache is read-through from the caller's side: a miss is never filled
/// by the cache itself. Implementations can use Redis, in-memory caches, or
/// other backends.
#[async_trait]
pub trait LinkCache: Send + Sync + 'static {
    /// Get a link from the cache.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>>;

    /// Store a link with a per-entry TTL.
    async fn put(&self, code: &ShortCode, link: &ShortLink, ttl: Duration) -> Result<()>;

    /// Remove a link from the cache.
    ///
    /// It is not an error if the key does not exist.
    async fn invalidate(&self, code: &ShortCode) -> Result<()>;
}

#[async_trait]
impl<T: LinkCache + ?Sized> LinkCache for Arc<T> {
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        (**self).get(code).await
    }

    async fn put(&self, code: &ShortCode, link: &ShortLink, ttl: Duration) -> Result<()> {
        (**self).put(code, link, ttl).await
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        (**self).invalidate(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    fn link(created_at: Timestamp, expires_at: Option<Timestamp>) -> ShortLink {
        ShortLink::new(
            ShortCode::new_unchecked("aZ3kQ1"),
            "https://example.com",
            created_at,
            expires_at,
        )
        .unwrap()
    }

    #[test]
    fn key_format() {
        let code = ShortCode::new_unchecked("aZ3kQ1");
        assert_eq!(cache_key(&code), "shortlink:aZ3kQ1");
    }

    #[test]
    fn no_expiry_uses_default_ttl() {
        let now = Timestamp::now();
        let l = link(now, None);
        assert_eq!(cache_ttl(&l, now, DEFAULT_CACHE_TTL), Some(DEFAULT_CACHE_TTL));
    }

    #[test]
    fn ttl_is_bounded_by_expiry() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let l = link(now, Some(now + SignedDuration::from_secs(90)));

        assert_eq!(
            cache_ttl(&l, now, DEFAULT_CACHE_TTL),
            Some(Duration::from_secs(90))
        );

        let far = link(now, Some(now + SignedDuration::from_hours(48)));
        assert_eq!(cache_ttl(&far, now, DEFAULT_CACHE_TTL), Some(DEFAULT_CACHE_TTL));
    }

    #[test]
    fn ttl_rounds_remaining_time_down() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let l = link(now, Some(now + SignedDuration::from_secs(10)));
        let later = now + SignedDuration::from_millis(8_500);

        assert_eq!(
            cache_ttl(&l, later, DEFAULT_CACHE_TTL),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn expired_or_deleted_links_are_not_cached() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let l = link(now, Some(now + SignedDuration::from_secs(10)));

        let at_expiry = now + SignedDuration::from_secs(10);
        assert_eq!(cache_ttl(&l, at_expiry, DEFAULT_CACHE_TTL), None);

        let almost = now + SignedDuration::from_millis(9_500);
        assert_eq!(cache_ttl(&l, almost, DEFAULT_CACHE_TTL), None);

        let mut deleted = link(now, None);
        deleted.deleted_at = Some(now);
        assert_eq!(cache_ttl(&deleted, now, DEFAULT_CACHE_TTL), None);
    }
}
