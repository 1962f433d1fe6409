use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use portal_core::{
    cache_ttl, validate_long_url, LinkCache, LinkEvent, Repository, ShortCode, ShortLink,
    StorageError, DEFAULT_CACHE_TTL,
};
use portal_events::{publish_with_timeout, EventPublisher};
use portal_generator::Generator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::error::{Result, ShortenerError};

/// Upper bound on a link's lifetime: one year.
pub const DEFAULT_MAX_TTL: SignedDuration = SignedDuration::from_hours(365 * 24);

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerConfig {
    /// Public base of short URLs, e.g. `https://short.ly`.
    #[builder(setter(into))]
    pub base_url: String,
    /// Generated candidates tried before giving up.
    #[builder(default = 5)]
    pub max_attempts: usize,
    /// Lifetime of links created without a TTL. `None` means they never expire.
    #[builder(default)]
    pub default_ttl: Option<SignedDuration>,
    #[builder(default = DEFAULT_MAX_TTL)]
    pub max_ttl: SignedDuration,
    /// Cache TTL for links without an expiry.
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub cache_ttl: Duration,
    #[builder(default = Duration::from_millis(500))]
    pub publish_timeout: Duration,
}

/// Input of [`Shortener::shorten`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortenRequest {
    pub long_url: String,
    pub custom_code: Option<String>,
    pub ttl: Option<SignedDuration>,
}

impl ShortenRequest {
    pub fn new(long_url: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            ..Default::default()
        }
    }

    pub fn with_custom_code(mut self, code: impl Into<String>) -> Self {
        self.custom_code = Some(code.into());
        self
    }

    pub fn with_ttl(mut self, ttl: SignedDuration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a short link for `request.long_url`.
    async fn shorten(&self, request: ShortenRequest) -> Result<ShortLink>;

    /// The live link behind `code`, hit count included.
    async fn details(&self, code: &str) -> Result<ShortLink>;

    /// Soft-deletes the link behind `code`.
    async fn delete(&self, code: &str) -> Result<()>;

    /// The public URL of `code`.
    fn short_url(&self, code: &ShortCode) -> String;
}

/// Creates, inspects and deletes short links.
///
/// The repository's unique constraint is the only uniqueness guard. Cache
/// writes and event publishing are best effort: their failures are logged
/// and never fail a request.
pub struct ShortenerService<R, G, C, P> {
    repository: Arc<R>,
    generator: Arc<G>,
    cache: Arc<C>,
    publisher: Arc<P>,
    config: Arc<ShortenerConfig>,
}

impl<R, G, C, P> Clone for ShortenerService<R, G, C, P> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            cache: Arc::clone(&self.cache),
            publisher: Arc::clone(&self.publisher),
            config: Arc::clone(&self.config),
        }
    }
}

impl<R, G, C, P> ShortenerService<R, G, C, P>
where
    R: Repository,
    G: Generator,
    C: LinkCache,
    P: EventPublisher,
{
    pub fn new(repository: R, generator: G, cache: C, publisher: P, config: ShortenerConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            cache: Arc::new(cache),
            publisher: Arc::new(publisher),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ShortenerConfig {
        &self.config
    }

    fn expiry(&self, now: Timestamp, ttl: Option<SignedDuration>) -> Result<Option<Timestamp>> {
        let Some(ttl) = ttl.or(self.config.default_ttl) else {
            return Ok(None);
        };

        if ttl < SignedDuration::from_secs(1) {
            return Err(ShortenerError::InvalidTtl(format!(
                "ttl must be at least 1 second, got {}s",
                ttl.as_secs()
            )));
        }
        if ttl > self.config.max_ttl {
            return Err(ShortenerError::InvalidTtl(format!(
                "ttl must not exceed {}s, got {}s",
                self.config.max_ttl.as_secs(),
                ttl.as_secs()
            )));
        }

        now.checked_add(ttl)
            .map(Some)
            .map_err(|e| ShortenerError::InvalidTtl(e.to_string()))
    }

    async fn insert_custom(
        &self,
        code: &str,
        long_url: &str,
        now: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> Result<ShortLink> {
        let code = ShortCode::new(code)?;

        if self.repository.exists(&code).await? {
            return Err(ShortenerError::CodeTaken(code.to_string()));
        }

        let link = ShortLink::new(code, long_url, now, expires_at)?;
        self.repository.insert(&link).await?;
        Ok(link)
    }

    async fn insert_generated(
        &self,
        long_url: &str,
        now: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> Result<ShortLink> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let link = ShortLink::new(self.generator.generate(), long_url, now, expires_at)?;

            match self.repository.insert(&link).await {
                Ok(()) => return Ok(link),
                Err(StorageError::Conflict(code)) => {
                    debug!(code = %code, attempt, "generated code collided, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(max_attempts, "short code generation exhausted");
        Err(ShortenerError::GenerationExhausted(max_attempts))
    }

    async fn announce(&self, event: LinkEvent) {
        if let Err(e) = publish_with_timeout(&*self.publisher, &event, self.config.publish_timeout).await {
            warn!(code = %event.code(), topic = event.topic(), error = %e, "failed to publish event");
        }
    }
}

#[async_trait]
impl<R, G, C, P> Shortener for ShortenerService<R, G, C, P>
where
    R: Repository,
    G: Generator,
    C: LinkCache,
    P: EventPublisher,
{
    async fn shorten(&self, request: ShortenRequest) -> Result<ShortLink> {
        validate_long_url(&request.long_url)?;

        let now = Timestamp::now();
        let expires_at = self.expiry(now, request.ttl)?;

        let link = match request.custom_code.as_deref() {
            Some(code) => {
                self.insert_custom(code, &request.long_url, now, expires_at)
                    .await?
            }
            None => {
                self.insert_generated(&request.long_url, now, expires_at)
                    .await?
            }
        };

        info!(code = %link.code, expires_at = ?link.expires_at, "created short link");

        if let Some(ttl) = cache_ttl(&link, now, self.config.cache_ttl) {
            if let Err(e) = self.cache.put(&link.code, &link, ttl).await {
                warn!(code = %link.code, error = %e, "failed to write link to cache");
            }
        }

        self.announce(LinkEvent::created(&link)).await;

        Ok(link)
    }

    async fn details(&self, code: &str) -> Result<ShortLink> {
        let Ok(code) = ShortCode::new(code) else {
            return Err(ShortenerError::NotFound(code.to_string()));
        };

        match self.repository.find(&code).await? {
            Some(link) if !link.is_deleted() => Ok(link),
            _ => Err(ShortenerError::NotFound(code.to_string())),
        }
    }

    async fn delete(&self, code: &str) -> Result<()> {
        let Ok(code) = ShortCode::new(code) else {
            return Err(ShortenerError::NotFound(code.to_string()));
        };

        if !self.repository.mark_deleted(&code, Timestamp::now()).await? {
            return Err(ShortenerError::NotFound(code.to_string()));
        }

        info!(code = %code, "deleted short link");

        if let Err(e) = self.cache.invalidate(&code).await {
            warn!(code = %code, error = %e, "failed to invalidate cached link");
        }

        self.announce(LinkEvent::expired(code)).await;
        Ok(())
    }

    fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.config.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_cache::{MokaLinkCache, NullCache};
    use portal_core::{CacheError, ReadRepository};
    use portal_events::{EventError, NoopPublisher};
    use portal_generator::{RandomGenerator, ScrambledSequence, ScrambledSequenceSettings};
    use portal_storage::InMemoryRepository;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    const BASE_URL: &str = "https://short.ly";

    fn config() -> ShortenerConfig {
        ShortenerConfig::builder().base_url(BASE_URL).build()
    }

    type TestService = ShortenerService<Arc<InMemoryRepository>, RandomGenerator, MokaLinkCache, Arc<RecordingPublisher>>;

    struct Harness {
        service: TestService,
        repository: Arc<InMemoryRepository>,
        cache: MokaLinkCache,
        events: Arc<RecordingPublisher>,
    }

    fn harness() -> Harness {
        let repository = Arc::new(InMemoryRepository::new());
        let cache = MokaLinkCache::default();
        let events = Arc::new(RecordingPublisher::default());
        let service = ShortenerService::new(
            Arc::clone(&repository),
            RandomGenerator::default(),
            cache.clone(),
            Arc::clone(&events),
            config(),
        );
        Harness {
            service,
            repository,
            cache,
            events,
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<LinkEvent>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &LinkEvent) -> portal_events::Result<()> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _event: &LinkEvent) -> portal_events::Result<()> {
            Err(EventError::Publish("broker down".to_string()))
        }
    }

    struct FailingCache;

    #[async_trait]
    impl LinkCache for FailingCache {
        async fn get(&self, _code: &ShortCode) -> portal_core::cache::Result<Option<ShortLink>> {
            Err(CacheError::Unavailable("cache down".to_string()))
        }

        async fn put(
            &self,
            _code: &ShortCode,
            _link: &ShortLink,
            _ttl: Duration,
        ) -> portal_core::cache::Result<()> {
            Err(CacheError::Unavailable("cache down".to_string()))
        }

        async fn invalidate(&self, _code: &ShortCode) -> portal_core::cache::Result<()> {
            Err(CacheError::Unavailable("cache down".to_string()))
        }
    }

    /// Always proposes the same code.
    struct FixedGenerator(&'static str);

    impl Generator for FixedGenerator {
        fn generate(&self) -> ShortCode {
            ShortCode::new_unchecked(self.0)
        }
    }

    struct UnavailableRepository;

    #[async_trait]
    impl ReadRepository for UnavailableRepository {
        async fn find(&self, _code: &ShortCode) -> portal_core::repository::Result<Option<ShortLink>> {
            Err(StorageError::Unavailable("db down".to_string()))
        }

        async fn exists(&self, _code: &ShortCode) -> portal_core::repository::Result<bool> {
            Err(StorageError::Unavailable("db down".to_string()))
        }
    }

    #[async_trait]
    impl Repository for UnavailableRepository {
        async fn insert(&self, _link: &ShortLink) -> portal_core::repository::Result<()> {
            Err(StorageError::Unavailable("db down".to_string()))
        }

        async fn mark_deleted(
            &self,
            _code: &ShortCode,
            _at: Timestamp,
        ) -> portal_core::repository::Result<bool> {
            Err(StorageError::Unavailable("db down".to_string()))
        }

        async fn increment_hits(&self, _code: &ShortCode, _by: u64) -> portal_core::repository::Result<()> {
            Err(StorageError::Unavailable("db down".to_string()))
        }

        async fn sweep_expired(
            &self,
            _now: Timestamp,
            _limit: usize,
        ) -> portal_core::repository::Result<Vec<ShortCode>> {
            Err(StorageError::Unavailable("db down".to_string()))
        }

        async fn purge_deleted(&self, _before: Timestamp) -> portal_core::repository::Result<u64> {
            Err(StorageError::Unavailable("db down".to_string()))
        }
    }

    #[tokio::test]
    async fn shorten_persists_caches_and_announces() {
        let h = harness();
        let long_url = "https://example.com/very/long/path";

        let link = h.service.shorten(ShortenRequest::new(long_url)).await.unwrap();

        assert_eq!(link.long_url, long_url);
        assert_eq!(link.expires_at, None);
        assert_eq!(h.repository.find(&link.code).await.unwrap(), Some(link.clone()));
        assert_eq!(h.cache.get(&link.code).await.unwrap(), Some(link.clone()));
        assert_eq!(*h.events.events.lock().await, vec![LinkEvent::created(&link)]);
        assert_eq!(
            h.service.short_url(&link.code),
            format!("{BASE_URL}/{}", link.code)
        );
    }

    #[tokio::test]
    async fn shorten_with_ttl_sets_expiry() {
        let h = harness();

        let link = h
            .service
            .shorten(ShortenRequest::new("https://example.com").with_ttl(SignedDuration::from_secs(90)))
            .await
            .unwrap();

        let expires_at = link.expires_at.unwrap();
        assert_eq!(expires_at.as_second() - link.created_at.as_second(), 90);
    }

    #[tokio::test]
    async fn default_ttl_applies_when_none_given() {
        let service = ShortenerService::new(
            InMemoryRepository::new(),
            RandomGenerator::default(),
            NullCache,
            NoopPublisher,
            ShortenerConfig::builder()
                .base_url(BASE_URL)
                .default_ttl(Some(SignedDuration::from_hours(24)))
                .build(),
        );

        let link = service
            .shorten(ShortenRequest::new("https://example.com"))
            .await
            .unwrap();

        assert_eq!(
            link.expires_at.unwrap().as_second() - link.created_at.as_second(),
            24 * 3600
        );
    }

    #[tokio::test]
    async fn rejects_invalid_urls() {
        let h = harness();

        for bad in ["", "not-a-url", "ftp://example.com", "https://"] {
            let err = h.service.shorten(ShortenRequest::new(bad)).await.unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidUrl(_)), "{bad}: {err:?}");
        }
        assert!(h.repository.is_empty());
    }

    #[tokio::test]
    async fn rejects_out_of_range_ttls() {
        let h = harness();

        for ttl in [
            SignedDuration::ZERO,
            SignedDuration::from_secs(-5),
            SignedDuration::from_millis(500),
            DEFAULT_MAX_TTL + SignedDuration::from_secs(1),
        ] {
            let err = h
                .service
                .shorten(ShortenRequest::new("https://example.com").with_ttl(ttl))
                .await
                .unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidTtl(_)), "{ttl:?}: {err:?}");
        }

        h.service
            .shorten(ShortenRequest::new("https://example.com").with_ttl(DEFAULT_MAX_TTL))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn custom_code_is_used_verbatim() {
        let h = harness();

        let link = h
            .service
            .shorten(ShortenRequest::new("https://example.com").with_custom_code("MyLink1"))
            .await
            .unwrap();

        assert_eq!(link.code.as_str(), "MyLink1");
    }

    #[tokio::test]
    async fn malformed_custom_code_is_rejected() {
        let h = harness();

        for bad in ["abc", "has-dash", "waytoolongcode", "spa ce12"] {
            let err = h
                .service
                .shorten(ShortenRequest::new("https://example.com").with_custom_code(bad))
                .await
                .unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidShortCode(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn taken_custom_code_conflicts_even_after_delete() {
        let h = harness();
        let request = ShortenRequest::new("https://example.com").with_custom_code("MyLink1");

        h.service.shorten(request.clone()).await.unwrap();
        let err = h.service.shorten(request.clone()).await.unwrap_err();
        assert!(matches!(err, ShortenerError::CodeTaken(_)));

        h.service.delete("MyLink1").await.unwrap();
        let err = h.service.shorten(request).await.unwrap_err();
        assert!(matches!(err, ShortenerError::CodeTaken(_)));
    }

    #[tokio::test]
    async fn concurrent_custom_codes_have_exactly_one_winner() {
        let h = harness();
        let service = Arc::new(h.service);
        let mut handles = vec![];

        for i in 0..32 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .shorten(
                        ShortenRequest::new(format!("https://example{i}.com"))
                            .with_custom_code("race01"),
                    )
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(ShortenerError::CodeTaken(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn ten_thousand_generated_codes_are_unique() {
        let service = ShortenerService::new(
            InMemoryRepository::with_capacity(10_000),
            ScrambledSequence::new(ScrambledSequenceSettings::builder().build()).unwrap(),
            NullCache,
            NoopPublisher,
            config(),
        );

        let mut codes = HashSet::new();
        for i in 0..10_000 {
            let link = service
                .shorten(ShortenRequest::new(format!("https://example.com/{i}")))
                .await
                .unwrap();
            assert!(codes.insert(link.code));
        }
    }

    #[tokio::test]
    async fn collisions_exhaust_after_max_attempts() {
        let repository = Arc::new(InMemoryRepository::new());
        let service = ShortenerService::new(
            Arc::clone(&repository),
            FixedGenerator("same01"),
            NullCache,
            NoopPublisher,
            ShortenerConfig::builder()
                .base_url(BASE_URL)
                .max_attempts(3)
                .build(),
        );

        service
            .shorten(ShortenRequest::new("https://first.example"))
            .await
            .unwrap();

        let err = service
            .shorten(ShortenRequest::new("https://second.example"))
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::GenerationExhausted(3)));
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn cache_and_publish_failures_do_not_fail_shorten() {
        let service = ShortenerService::new(
            InMemoryRepository::new(),
            RandomGenerator::default(),
            FailingCache,
            FailingPublisher,
            config(),
        );

        let link = service
            .shorten(ShortenRequest::new("https://example.com"))
            .await
            .unwrap();
        service.delete(link.code.as_str()).await.unwrap();
    }

    #[tokio::test]
    async fn store_outage_is_reported() {
        let service = ShortenerService::new(
            UnavailableRepository,
            RandomGenerator::default(),
            NullCache,
            NoopPublisher,
            config(),
        );

        let err = service
            .shorten(ShortenRequest::new("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn details_hide_deleted_and_unknown_links() {
        let h = harness();
        let link = h
            .service
            .shorten(ShortenRequest::new("https://example.com"))
            .await
            .unwrap();

        h.repository.increment_hits(&link.code, 4).await.unwrap();
        let details = h.service.details(link.code.as_str()).await.unwrap();
        assert_eq!(details.hit_count, 4);

        assert!(matches!(
            h.service.details("nope00").await,
            Err(ShortenerError::NotFound(_))
        ));
        assert!(matches!(
            h.service.details("!!").await,
            Err(ShortenerError::NotFound(_))
        ));

        h.service.delete(link.code.as_str()).await.unwrap();
        assert!(matches!(
            h.service.details(link.code.as_str()).await,
            Err(ShortenerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_invalidates_and_announces_once() {
        let h = harness();
        let link = h
            .service
            .shorten(ShortenRequest::new("https://example.com"))
            .await
            .unwrap();

        h.service.delete(link.code.as_str()).await.unwrap();

        assert!(h.cache.get(&link.code).await.unwrap().is_none());
        assert!(h.repository.find(&link.code).await.unwrap().unwrap().is_deleted());
        assert_eq!(
            h.events.events.lock().await.last(),
            Some(&LinkEvent::expired(link.code.clone()))
        );

        assert!(matches!(
            h.service.delete(link.code.as_str()).await,
            Err(ShortenerError::NotFound(_))
        ));
        assert_eq!(h.events.events.lock().await.len(), 2);
    }
}
