use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use portal_core::{LinkCache, ShortCode, ShortLink};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

use crate::Result;

#[derive(Debug, Clone)]
struct CachedLink {
    link: ShortLink,
    ttl: Duration,
}

/// Expires every entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<ShortCode, CachedLink> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _code: &ShortCode,
        value: &CachedLink,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _code: &ShortCode,
        value: &CachedLink,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Settings for [`MokaLinkCache`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct MokaCacheConfig {
    /// Maximum number of entries the cache can hold.
    #[builder(default = 10_000)]
    pub max_capacity: u64,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// An in-process cache backed by Moka.
///
/// Every entry carries its own TTL, so a link with an expiry is evicted no
/// later than the TTL it was written with. Suited to single-node deployments
/// or as the L1 in front of Redis.
#[derive(Clone)]
pub struct MokaLinkCache {
    cache: Cache<ShortCode, CachedLink>,
}

impl MokaLinkCache {
    pub fn new(config: MokaCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::new(MokaCacheConfig::builder().max_capacity(max_capacity).build())
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MokaLinkCache {
    fn default() -> Self {
        Self::new(MokaCacheConfig::default())
    }
}

impl std::fmt::Debug for MokaLinkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaLinkCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl LinkCache for MokaLinkCache {
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        match self.cache.get(code).await {
            Some(cached) => {
                debug!(code = %code, "cache hit in moka");
                Ok(Some(cached.link))
            }
            None => {
                trace!(code = %code, "cache miss in moka");
                Ok(None)
            }
        }
    }

    async fn put(&self, code: &ShortCode, link: &ShortLink, ttl: Duration) -> Result<()> {
        self.cache
            .insert(
                code.clone(),
                CachedLink {
                    link: link.clone(),
                    ttl,
                },
            )
            .await;
        trace!(code = %code, ttl_secs = ttl.as_secs(), "cached link in moka");
        Ok(())
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        self.cache.invalidate(code).await;
        trace!(code = %code, "invalidated link in moka");
        Ok(())
    }
}
