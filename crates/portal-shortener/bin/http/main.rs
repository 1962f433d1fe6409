mod cli;

use crate::cli::{BusBackendArg, CacheBackendArg, GeneratorArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use jiff::SignedDuration;
use portal_cache::{LayeredCache, MokaLinkCache, NullCache, RedisLinkCache};
use portal_core::{LinkCache, RequestTimeouts};
use portal_events::{EventPublisher, NoopPublisher, RedisStreamPublisher};
use portal_generator::{Generator, RandomGenerator, ScrambledSequence, ScrambledSequenceSettings};
use portal_shortener::http::{App, AppState};
use portal_shortener::{ShortenerConfig, ShortenerService};
use portal_storage::{InMemoryRepository, MySqlRepository, Repository};
use portal_telemetry::TelemetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();

    let _telemetry = portal_telemetry::init(
        TelemetryConfig::builder()
            .service_name("portal-shortener")
            .log_format(config.log_format)
            .otlp_endpoint(config.otlp_endpoint.clone())
            .build(),
    )?;

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        bus_backend = %config.bus,
        generator = %config.generator,
        "starting shortener HTTP server"
    );

    let repository = build_repository(&config).await?;
    let generator = build_generator(&config)?;
    let cache = build_cache(&config).await?;
    let publisher = build_publisher(&config).await?;

    let shortener_config = ShortenerConfig::builder()
        .base_url(config.base_url.clone())
        .max_attempts(config.max_attempts)
        .default_ttl(config.default_ttl_secs.map(SignedDuration::from_secs))
        .max_ttl(SignedDuration::from_hours(config.max_ttl_days * 24))
        .cache_ttl(Duration::from_secs(config.cache_ttl_secs))
        .publish_timeout(Duration::from_millis(config.publish_timeout_ms))
        .build();

    let service = ShortenerService::new(repository, generator, cache, publisher, shortener_config);

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

    info!("shortener HTTP server stopped");
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
            if config.create_schema {
                repository.create_schema().await?;
            }
            Ok(Arc::new(repository))
        }
    }
}

fn build_generator(config: &CLI) -> anyhow::Result<Box<dyn Generator>> {
    match config.generator {
        GeneratorArg::Random => Ok(Box::new(RandomGenerator::new(config.code_length)?)),
        GeneratorArg::Scrambled => {
            let settings = ScrambledSequenceSettings::builder()
                .length(config.code_length)
                .start(config.sequence_start)
                .build();
            Ok(Box::new(ScrambledSequence::new(settings)?))
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
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
