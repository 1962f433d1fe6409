mod cli;

use crate::cli::{BusBackendArg, CacheBackendArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use portal_cache::{LayeredCache, MokaLinkCache, NullCache, RedisLinkCache};
use portal_core::{LinkCache, RequestTimeouts};
use portal_events::{
    CacheWarmer, EventPublisher, NoopPublisher, RedisStreamConsumer, RedisStreamPublisher,
    StreamConsumerConfig,
};
use portal_redirector::http::{App, AppState};
use portal_redirector::{HitCounter, HitCounterConfig, RedirectorConfig, RedirectorService};
use portal_storage::{InMemoryRepository, MySqlRepository, Repository};
use portal_telemetry::TelemetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const HIT_FLUSH_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    config.validate()?;

    let _telemetry = portal_telemetry::init(
        TelemetryConfig::builder()
            .service_name("portal-redirector")
            .log_format(config.log_format)
            .otlp_endpoint(config.otlp_endpoint.clone())
            .build(),
    )?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        bus_backend = %config.bus,
        "starting redirector HTTP server"
    );

    let cache_ttl = Duration::from_secs(config.cache_ttl_secs);
    let repository = build_repository(&config).await?;
    let cache = build_cache(&config).await?;
    let publisher = build_publisher(&config).await?;

    if config.bus == BusBackendArg::Redis && config.cache != CacheBackendArg::None {
        let consumer_config = StreamConsumerConfig::builder()
            .group(config.consumer_group.clone())
            .consumer(config.consumer_name.clone())
            .build();
        let warmer = CacheWarmer::new(Arc::clone(&cache)).with_default_ttl(cache_ttl);

        tokio::spawn(RedisStreamConsumer::run_forever(
            redis_url(&config)?.to_string(),
            consumer_config,
            warmer,
        ));
    }

    let hit_config = HitCounterConfig::builder()
        .capacity(config.hit_buffer)
        .batch_size(config.hit_batch_size)
        .flush_interval(Duration::from_millis(config.hit_flush_interval_ms))
        .build();
    let (hits, hit_worker) = HitCounter::spawn(Arc::clone(&repository), hit_config);

    let redirector_config = RedirectorConfig::builder()
        .cache_ttl(cache_ttl)
        .publish_timeout(Duration::from_millis(config.publish_timeout_ms))
        .build();
    let service = RedirectorService::new(repository, cache, publisher, hits, redirector_config);

    let timeouts = RequestTimeouts::builder()
        .default(Duration::from_millis(config.request_timeout_ms))
        .max(Duration::from_millis(config.max_request_timeout_ms))
        .build();

    let app = App::router(AppState::new(Arc::new(service), timeouts));
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last hit counter handle; wait for the final flush.
    if tokio::time::timeout(HIT_FLUSH_GRACE, hit_worker).await.is_err() {
        warn!("hit counter did not flush before shutdown");
    }

    info!("redirector HTTP server stopped");
    Ok(())
}

async fn build_repository(config: &CLI) -> anyhow::Result<Arc<dyn Repository>> {
    match config.storage {
        StorageBackendArg::InMemory => Ok(Arc::new(InMemoryRepository::new())),
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository =
                MySqlRepository::connect(mysql_dsn, config.mysql_max_connections).await?;
            Ok(Arc::new(repository))
        }
    }
}

fn redis_url(config: &CLI) -> anyhow::Result<&str> {
    config
        .redis_url
        .as_deref()
        .context("redis url is required for the redis cache and event bus")
}

async fn build_cache(config: &CLI) -> anyhow::Result<Arc<dyn LinkCache>> {
    let cache: Arc<dyn LinkCache> = match config.cache {
        CacheBackendArg::None => Arc::new(NullCache),
        CacheBackendArg::Moka => Arc::new(MokaLinkCache::with_capacity(config.cache_capacity)),
        CacheBackendArg::Redis => Arc::new(RedisLinkCache::connect(redis_url(config)?).await?),
        CacheBackendArg::Layered => {
            let l1 = MokaLinkCache::with_capacity(config.cache_capacity);
            let l2 = RedisLinkCache::connect(redis_url(config)?).await?;
            Arc::new(
                LayeredCache::new(l1, l2)
                    .with_backfill_ttl(Duration::from_secs(config.cache_ttl_secs)),
            )
        }
    };
    Ok(cache)
}

async fn build_publisher(config: &CLI) -> anyhow::Result<Arc<dyn EventPublisher>> {
    let publisher: Arc<dyn EventPublisher> = match config.bus {
        BusBackendArg::None => Arc::new(NoopPublisher),
        BusBackendArg::Redis => Arc::new(RedisStreamPublisher::connect(redis_url(config)?).await?),
    };
    Ok(publisher)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
