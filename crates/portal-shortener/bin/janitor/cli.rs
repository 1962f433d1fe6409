use clap::{Parser, ValueEnum};
use portal_telemetry::LogFormat;
use std::fmt::{Display, Formatter};

pub const MYSQL_DSN_ENV: &str = "PORTAL_JANITOR_MYSQL_DSN";
pub const MYSQL_MAX_CONNECTIONS_ENV: &str = "PORTAL_JANITOR_MYSQL_MAX_CONNECTIONS";
pub const CACHE_BACKEND_ENV: &str = "PORTAL_JANITOR_CACHE_BACKEND";
pub const BUS_BACKEND_ENV: &str = "PORTAL_JANITOR_BUS_BACKEND";
pub const REDIS_URL_ENV: &str = "PORTAL_JANITOR_REDIS_URL";
pub const BATCH_SIZE_ENV: &str = "PORTAL_JANITOR_BATCH_SIZE";
pub const PURGE_AFTER_DAYS_ENV: &str = "PORTAL_JANITOR_PURGE_AFTER_DAYS";
pub const INTERVAL_SECS_ENV: &str = "PORTAL_JANITOR_INTERVAL_SECS";
pub const PUBLISH_TIMEOUT_MS_ENV: &str = "PORTAL_JANITOR_PUBLISH_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "PORTAL_JANITOR_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "PORTAL_JANITOR_OTLP_ENDPOINT";

pub const MAX_PURGE_AFTER_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "none")]
    None,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::None => write!(f, "none"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BusBackendArg {
    #[value(name = "none")]
    None,
    #[value(name = "redis")]
    Redis,
}

impl Display for BusBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BusBackendArg::None => write!(f, "none"),
            BusBackendArg::Redis => write!(f, "redis"),
        }
    }
}

/// Soft-deletes expired links and purges old soft-deleted rows.
#[derive(Debug, Parser)]
#[command(name = "portal-link-janitor")]
pub struct CLI {
    #[arg(long, env = MYSQL_DSN_ENV)]
    pub mysql_dsn: String,

    #[arg(long, env = MYSQL_MAX_CONNECTIONS_ENV, default_value_t = 2)]
    pub mysql_max_connections: u32,

    /// Shared cache to evict expired links from.
    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::None
    )]
    pub cache: CacheBackendArg,

    #[arg(
        long,
        env = BUS_BACKEND_ENV,
        value_enum,
        default_value_t = BusBackendArg::None
    )]
    pub bus: BusBackendArg,

    #[arg(
        long,
        env = REDIS_URL_ENV,
        required_if_eq_any([("cache", "redis"), ("bus", "redis")])
    )]
    pub redis_url: Option<String>,

    #[arg(long, env = BATCH_SIZE_ENV, default_value_t = 500)]
    pub batch_size: usize,

    /// Hard-delete links soft-deleted more than this many days ago. Purged
    /// codes can be issued again.
    #[arg(
        long,
        env = PURGE_AFTER_DAYS_ENV,
        value_parser = clap::value_parser!(i64).range(1..=MAX_PURGE_AFTER_DAYS)
    )]
    pub purge_after_days: Option<i64>,

    /// Repeat the pass on this interval. A single pass runs when unset.
    #[arg(long, env = INTERVAL_SECS_ENV)]
    pub interval_secs: Option<u64>,

    #[arg(long, env = PUBLISH_TIMEOUT_MS_ENV, default_value_t = 500)]
    pub publish_timeout_ms: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    #[arg(long, env = OTLP_ENDPOINT_ENV)]
    pub otlp_endpoint: Option<String>,
}
