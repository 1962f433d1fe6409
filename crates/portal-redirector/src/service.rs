use async_trait::async_trait;
use jiff::Timestamp;
use portal_core::{cache_ttl, LinkCache, LinkEvent, Repository, ShortCode, ShortLink, DEFAULT_CACHE_TTL};
use portal_events::{publish_with_timeout, EventPublisher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

use crate::error::{RedirectError, Result};
use crate::hits::HitCounter;
use crate::redirector::{Redirector, Resolved};

#[derive(Debug, Clone, TypedBuilder)]
pub struct RedirectorConfig {
    /// Cache TTL for links without an expiry.
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub cache_ttl: Duration,
    #[builder(default = Duration::from_millis(500))]
    pub publish_timeout: Duration,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Resolves short codes through a read-through cache.
///
/// Lookups try the cache first and fall back to the store on a miss or a
/// cache error; store hits are written back with the link's TTL policy.
/// A link found past its expiry is reported as expired and cleaned up in
/// the background: evicted, soft-deleted and announced as `LinkExpired`.
pub struct RedirectorService<R, C, P> {
    repository: Arc<R>,
    cache: Arc<C>,
    publisher: Arc<P>,
    hits: HitCounter,
    config: RedirectorConfig,
}

impl<R, C, P> Clone for RedirectorService<R, C, P> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cache: Arc::clone(&self.cache),
            publisher: Arc::clone(&self.publisher),
            hits: self.hits.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R, C, P> RedirectorService<R, C, P>
where
    R: Repository,
    C: LinkCache,
    P: EventPublisher,
{
    pub fn new(repository: R, cache: C, publisher: P, hits: HitCounter, config: RedirectorConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            cache: Arc::new(cache),
            publisher: Arc::new(publisher),
            hits,
            config,
        }
    }

    /// Cache first; cache failures count as a miss.
    async fn lookup_cache(&self, code: &ShortCode) -> Option<ShortLink> {
        match self.cache.get(code).await {
            Ok(link) => link,
            Err(e) => {
                warn!(code = %code, error = %e, "cache lookup failed, falling back to store");
                None
            }
        }
    }

    /// Writes a store hit back to the cache, then re-reads the row.
    ///
    /// A delete that committed after our first read may already have
    /// invalidated the cache before the write landed; the re-read sees it and
    /// evicts the stale entry again.
    async fn populate_cache(&self, link: &ShortLink, now: Timestamp) {
        let Some(ttl) = cache_ttl(link, now, self.config.cache_ttl) else {
            return;
        };
        if let Err(e) = self.cache.put(&link.code, link, ttl).await {
            // A layered cache may still have stored the entry in L1.
            warn!(code = %link.code, error = %e, "failed to populate cache");
        }

        let still_live = match self.repository.find(&link.code).await {
            Ok(Some(current)) => !current.is_deleted(),
            Ok(None) => false,
            Err(e) => {
                warn!(code = %link.code, error = %e, "failed to re-check cached link");
                false
            }
        };
        if !still_live {
            debug!(code = %link.code, "link deleted while caching, evicting");
            if let Err(e) = self.cache.invalidate(&link.code).await {
                warn!(code = %link.code, error = %e, "failed to evict stale link");
            }
        }
    }

    fn spawn_cleanup(&self, code: ShortCode, now: Timestamp) {
        let repository = Arc::clone(&self.repository);
        let cache = Arc::clone(&self.cache);
        let publisher = Arc::clone(&self.publisher);
        let publish_timeout = self.config.publish_timeout;

        tokio::spawn(async move {
            if let Err(e) = cache.invalidate(&code).await {
                warn!(code = %code, error = %e, "failed to evict expired link");
            }

            // Only the caller that flips the row announces the expiry.
            match repository.mark_deleted(&code, now).await {
                Ok(true) => {
                    let event = LinkEvent::expired(code);
                    if let Err(e) = publish_with_timeout(&publisher, &event, publish_timeout).await {
                        warn!(code = %event.code(), error = %e, "failed to publish expiry");
                    }
                }
                Ok(false) => trace!(code = %code, "expired link already deleted"),
                Err(e) => warn!(code = %code, error = %e, "failed to soft-delete expired link"),
            }
        });
    }
}

#[async_trait]
impl<R, C, P> Redirector for RedirectorService<R, C, P>
where
    R: Repository,
    C: LinkCache,
    P: EventPublisher,
{
    async fn resolve(&self, raw: &str) -> Result<Resolved> {
        let Ok(code) = ShortCode::new(raw) else {
            return Err(RedirectError::NotFound(raw.to_string()));
        };
        let now = Timestamp::now();

        let (link, from_store) = match self.lookup_cache(&code).await {
            Some(link) => (link, false),
            None => match self.repository.find(&code).await? {
                Some(link) => (link, true),
                None => {
                    trace!(code = %code, "short code not found");
                    return Err(RedirectError::NotFound(code.to_string()));
                }
            },
        };

        if link.is_expired(now) {
            debug!(code = %code, "short link expired");
            if !link.is_deleted() {
                self.spawn_cleanup(code.clone(), now);
            }
            return Err(RedirectError::Expired(code.to_string()));
        }

        if link.is_deleted() {
            trace!(code = %code, "short link deleted");
            return Err(RedirectError::NotFound(code.to_string()));
        }

        if from_store {
            self.populate_cache(&link, now).await;
        }

        self.hits.record(&code);
        debug!(code = %code, url = %link.long_url, "resolved short code");

        Ok(Resolved {
            kind: link.redirect_kind(),
            long_url: link.long_url,
        })
    }
}
