mod cli;

use crate::cli::{BusBackendArg, CacheBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use jiff::{SignedDuration, Timestamp};
use portal_cache::{NullCache, RedisLinkCache};
use portal_core::LinkCache;
use portal_events::{EventPublisher, NoopPublisher, RedisStreamPublisher};
use portal_shortener::{Janitor, JanitorConfig};
use portal_storage::MySqlRepository;
use portal_telemetry::TelemetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();

    let _telemetry = portal_telemetry::init(
        TelemetryConfig::builder()
            .service_name("portal-link-janitor")
            .log_format(config.log_format)
            .otlp_endpoint(config.otlp_endpoint.clone())
            .build(),
    )?;

    info!(
        cache_backend = %config.cache,
        bus_backend = %config.bus,
        batch_size = config.batch_size,
        purge_after_days = ?config.purge_after_days,
        interval_secs = ?config.interval_secs,
        "starting link janitor"
    );

    let repository = MySqlRepository::connect(&config.mysql_dsn, config.mysql_max_connections).await?;

    let cache: Arc<dyn LinkCache> = match config.cache {
        CacheBackendArg::None => Arc::new(NullCache),
        CacheBackendArg::Redis => Arc::new(RedisLinkCache::connect(redis_url(&config)?).await?),
    };

    let publisher: Arc<dyn EventPublisher> = match config.bus {
        BusBackendArg::None => Arc::new(NoopPublisher),
        BusBackendArg::Redis => Arc::new(RedisStreamPublisher::connect(redis_url(&config)?).await?),
    };

    let janitor_config = JanitorConfig::builder()
        .batch_size(config.batch_size)
        .purge_after(
            config
                .purge_after_days
                .map(|days| SignedDuration::from_hours(days * 24)),
        )
        .publish_timeout(Duration::from_millis(config.publish_timeout_ms))
        .build();

    let janitor = Janitor::new(repository, cache, publisher, janitor_config);

    let Some(interval_secs) = config.interval_secs else {
        janitor.run_once(Timestamp::now()).await?;
        return Ok(());
    };

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = janitor.run_once(Timestamp::now()).await {
                    error!(error = %e, "janitor pass failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

fn redis_url(config: &CLI) -> anyhow::Result<&str> {
    config
        .redis_url
        .as_deref()
        .context("redis url is required for the redis cache and event bus")
}
