use async_trait::async_trait;
use jiff::Timestamp;
use portal_core::{cache_ttl, LinkCache, LinkEvent, DEFAULT_CACHE_TTL};
use std::time::Duration;
use tracing::{debug, trace};

use crate::{EventError, EventHandler, Result};

/// Keeps a [`LinkCache`] in step with link lifecycle events.
///
/// `Created` writes the link with the usual TTL policy, skipping links that
/// are already expired. `Expired` evicts it. Both are idempotent, so a
/// redelivered event leaves the cache as the first delivery did.
#[derive(Debug, Clone)]
pub struct CacheWarmer<C> {
    cache: C,
    default_ttl: Duration,
}

impl<C: LinkCache> CacheWarmer<C> {
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            default_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

#[async_trait]
impl<C: LinkCache> EventHandler for CacheWarmer<C> {
    async fn handle(&self, event: &LinkEvent) -> Result<()> {
        let code = event.code();

        match event {
            LinkEvent::Created { .. } => {
                let Some(link) = event.link() else {
                    return Ok(());
                };
                let Some(ttl) = cache_ttl(&link, Timestamp::now(), self.default_ttl) else {
                    trace!(code = %code, "link already expired, not warming");
                    return Ok(());
                };
                self.cache
                    .put(code, &link, ttl)
                    .await
                    .map_err(|e| EventError::Consume(e.to_string()))?;
                debug!(code = %code, ttl_secs = ttl.as_secs(), "warmed cache");
            }
            LinkEvent::Expired { .. } => {
                self.cache
                    .invalidate(code)
                    .await
                    .map_err(|e| EventError::Consume(e.to_string()))?;
                debug!(code = %code, "evicted expired link");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;
    use portal_cache::MokaLinkCache;
    use portal_core::{ShortCode, ShortLink};

    fn link(code: &str, created_at: Timestamp, expires_at: Option<Timestamp>) -> ShortLink {
        ShortLink::new(
            ShortCode::new_unchecked(code),
            "https://example.com",
            created_at,
            expires_at,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn created_warms_and_redelivery_is_harmless() {
        let cache = MokaLinkCache::default();
        let warmer = CacheWarmer::new(cache.clone());
        let l = link("aZ3kQ1", Timestamp::now(), None);
        let event = LinkEvent::created(&l);

        warmer.handle(&event).await.unwrap();
        warmer.handle(&event).await.unwrap();

        assert_eq!(cache.get(&l.code).await.unwrap(), Some(l));
    }

    #[tokio::test]
    async fn expired_links_are_never_warmed() {
        let cache = MokaLinkCache::default();
        let warmer = CacheWarmer::new(cache.clone());
        let created = Timestamp::now() - SignedDuration::from_hours(2);
        let l = link("old001", created, Some(created + SignedDuration::from_hours(1)));

        warmer.handle(&LinkEvent::created(&l)).await.unwrap();

        assert!(cache.get(&l.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_event_evicts() {
        let cache = MokaLinkCache::default();
        let warmer = CacheWarmer::new(cache.clone());
        let l = link("aZ3kQ1", Timestamp::now(), None);

        warmer.handle(&LinkEvent::created(&l)).await.unwrap();
        warmer
            .handle(&LinkEvent::expired(l.code.clone()))
            .await
            .unwrap();
        warmer
            .handle(&LinkEvent::expired(l.code.clone()))
            .await
            .unwrap();

        assert!(cache.get(&l.code).await.unwrap().is_none());
    }
}
