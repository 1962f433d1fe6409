use async_trait::async_trait;
use jiff::Timestamp;
use portal_core::{cache_ttl, LinkCache, ShortCode, ShortLink, DEFAULT_CACHE_TTL};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::Result;

/// Two caches composed into one: a fast local L1 in front of a shared L2.
///
/// - `get` tries L1, then L2. An L2 hit is copied into L1 with a TTL derived
///   from the link itself, never longer than `backfill_ttl`.
/// - `put` writes L2 first, then L1. L1 is written even when L2 fails, and
///   the L2 error is returned afterwards.
/// - `invalidate` removes from both, reporting the first failure.
#[derive(Debug, Clone)]
pub struct LayeredCache<L1, L2> {
    l1: L1,
    l2: L2,
    backfill_ttl: Duration,
}

impl<L1, L2> LayeredCache<L1, L2> {
    pub fn new(l1: L1, l2: L2) -> Self {
        Self {
            l1,
            l2,
            backfill_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Caps the TTL of entries copied from L2 into L1.
    pub fn with_backfill_ttl(mut self, ttl: Duration) -> Self {
        self.backfill_ttl = ttl;
        self
    }

    pub fn l1(&self) -> &L1 {
        &self.l1
    }

    pub fn l2(&self) -> &L2 {
        &self.l2
    }

    pub fn into_inner(self) -> (L1, L2) {
        (self.l1, self.l2)
    }
}

#[async_trait]
impl<L1, L2> LinkCache for LayeredCache<L1, L2>
where
    L1: LinkCache,
    L2: LinkCache,
{
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        if let Some(link) = self.l1.get(code).await? {
            debug!(code = %code, "L1 cache hit");
            return Ok(Some(link));
        }

        trace!(code = %code, "L1 cache miss, trying L2");
        let Some(link) = self.l2.get(code).await? else {
            trace!(code = %code, "L2 cache miss");
            return Ok(None);
        };

        debug!(code = %code, "L2 cache hit");
        if let Some(ttl) = cache_ttl(&link, Timestamp::now(), self.backfill_ttl) {
            self.l1.put(code, &link, ttl).await?;
            trace!(code = %code, "backfilled L1");
        }

        Ok(Some(link))
    }

    async fn put(&self, code: &ShortCode, link: &ShortLink, ttl: Duration) -> Result<()> {
        let l2 = self.l2.put(code, link, ttl).await;
        if let Err(e) = &l2 {
            warn!(code = %code, error = %e, "L2 put failed, storing in L1 only");
        }
        self.l1.put(code, link, ttl).await?;
        trace!(code = %code, "stored link in L1");
        l2
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        let l1 = self.l1.invalidate(code).await;
        let l2 = self.l2.invalidate(code).await;
        trace!(code = %code, "invalidated link in L1 and L2");
        l1.and(l2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheError, MokaLinkCache};
    use jiff::SignedDuration;

    struct DownCache;

    #[async_trait]
    impl LinkCache for DownCache {
        async fn get(&self, _code: &ShortCode) -> Result<Option<ShortLink>> {
            Err(CacheError::Unavailable("redis down".to_string()))
        }

        async fn put(&self, _code: &ShortCode, _link: &ShortLink, _ttl: Duration) -> Result<()> {
            Err(CacheError::Unavailable("redis down".to_string()))
        }

        async fn invalidate(&self, _code: &ShortCode) -> Result<()> {
            Err(CacheError::Unavailable("redis down".to_string()))
        }
    }

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn link(c: &str, expires_at: Option<Timestamp>) -> ShortLink {
        ShortLink::new(code(c), "https://example.com", Timestamp::now(), expires_at).unwrap()
    }

    fn create_test_cache() -> LayeredCache<MokaLinkCache, MokaLinkCache> {
        LayeredCache::new(
            MokaLinkCache::with_capacity(100),
            MokaLinkCache::with_capacity(100),
        )
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn get_prefers_l1() {
        let cache = create_test_cache();
        let l = link("abc123", None);

        cache.l1.put(&l.code, &l, TTL).await.unwrap();

        assert_eq!(cache.get(&l.code).await.unwrap(), Some(l.clone()));
        assert!(cache.l2.get(&l.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_backfills_l1_from_l2() {
        let cache = create_test_cache();
        let l = link("abc123", None);

        cache.l2.put(&l.code, &l, TTL).await.unwrap();
        assert!(cache.l1.get(&l.code).await.unwrap().is_none());

        assert_eq!(cache.get(&l.code).await.unwrap(), Some(l.clone()));
        assert_eq!(cache.l1.get(&l.code).await.unwrap(), Some(l));
    }

    #[tokio::test]
    async fn expired_l2_entries_are_not_backfilled() {
        let cache = create_test_cache();
        let created = Timestamp::now() - SignedDuration::from_hours(2);
        let expired = ShortLink::new(
            code("old123"),
            "https://example.com",
            created,
            Some(created + SignedDuration::from_hours(1)),
        )
        .unwrap();

        cache.l2.put(&expired.code, &expired, TTL).await.unwrap();

        assert!(cache.get(&expired.code).await.unwrap().is_some());
        assert!(cache.l1.get(&expired.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_writes_both_layers() {
        let cache = create_test_cache();
        let l = link("abc123", Some(Timestamp::now() + SignedDuration::from_hours(1)));

        cache.put(&l.code, &l, TTL).await.unwrap();

        assert_eq!(cache.l1.get(&l.code).await.unwrap(), Some(l.clone()));
        assert_eq!(cache.l2.get(&l.code).await.unwrap(), Some(l));
    }

    #[tokio::test]
    async fn invalidate_clears_both_layers() {
        let cache = create_test_cache();
        let l = link("abc123", None);

        cache.l1.put(&l.code, &l, TTL).await.unwrap();
        cache.l2.put(&l.code, &l, TTL).await.unwrap();

        cache.invalidate(&l.code).await.unwrap();
        cache.invalidate(&l.code).await.unwrap();

        assert!(cache.l1.get(&l.code).await.unwrap().is_none());
        assert!(cache.l2.get(&l.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn l2_failure_still_fills_l1() {
        let cache = LayeredCache::new(MokaLinkCache::with_capacity(100), DownCache);
        let l = link("abc123", None);

        let err = cache.put(&l.code, &l, TTL).await.unwrap_err();
        assert!(matches!(err, CacheError::Unavailable(_)));
        assert_eq!(cache.l1.get(&l.code).await.unwrap(), Some(l));
    }

    #[tokio::test]
    async fn l2_failure_still_clears_l1() {
        let cache = LayeredCache::new(MokaLinkCache::with_capacity(100), DownCache);
        let l = link("abc123", None);
        cache.l1.put(&l.code, &l, TTL).await.unwrap();

        assert!(cache.invalidate(&l.code).await.is_err());
        assert!(cache.l1.get(&l.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn miss_when_both_empty() {
        let cache = create_test_cache();
        assert!(cache.get(&code("abc123")).await.unwrap().is_none());
    }
}
