use anyhow::bail;
use clap::{Parser, ValueEnum};
use portal_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "PORTAL_REDIRECTOR_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "PORTAL_REDIRECTOR_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "PORTAL_REDIRECTOR_MYSQL_DSN";
pub const MYSQL_MAX_CONNECTIONS_ENV: &str = "PORTAL_REDIRECTOR_MYSQL_MAX_CONNECTIONS";
pub const CACHE_BACKEND_ENV: &str = "PORTAL_REDIRECTOR_CACHE_BACKEND";
pub const CACHE_CAPACITY_ENV: &str = "PORTAL_REDIRECTOR_CACHE_CAPACITY";
pub const CACHE_TTL_SECS_ENV: &str = "PORTAL_REDIRECTOR_CACHE_TTL_SECS";
pub const BUS_BACKEND_ENV: &str = "PORTAL_REDIRECTOR_BUS_BACKEND";
pub const REDIS_URL_ENV: &str = "PORTAL_REDIRECTOR_REDIS_URL";
pub const CONSUMER_GROUP_ENV: &str = "PORTAL_REDIRECTOR_CONSUMER_GROUP";
pub const CONSUMER_NAME_ENV: &str = "PORTAL_REDIRECTOR_CONSUMER_NAME";
pub const HIT_BUFFER_ENV: &str = "PORTAL_REDIRECTOR_HIT_BUFFER";
pub const HIT_BATCH_SIZE_ENV: &str = "PORTAL_REDIRECTOR_HIT_BATCH_SIZE";
pub const HIT_FLUSH_INTERVAL_MS_ENV: &str = "PORTAL_REDIRECTOR_HIT_FLUSH_INTERVAL_MS";
pub const PUBLISH_TIMEOUT_MS_ENV: &str = "PORTAL_REDIRECTOR_PUBLISH_TIMEOUT_MS";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "PORTAL_REDIRECTOR_REQUEST_TIMEOUT_MS";
pub const MAX_REQUEST_TIMEOUT_MS_ENV: &str = "PORTAL_REDIRECTOR_MAX_REQUEST_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "PORTAL_REDIRECTOR_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "PORTAL_REDIRECTOR_OTLP_ENDPOINT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8081";
pub const DEFAULT_CONSUMER_GROUP: &str = "portal-redirector";
pub const DEFAULT_CONSUMER_NAME: &str = "redirector-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "none")]
    None,
    #[value(name = "moka")]
    Moka,
    #[value(name = "redis")]
    Redis,
    /// Moka in front of Redis.
    #[value(name = "layered")]
    Layered,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::None => write!(f, "none"),
            CacheBackendArg::Moka => write!(f, "moka"),
            CacheBackendArg::Redis => write!(f, "redis"),
            CacheBackendArg::Layered => write!(f, "layered"),
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

impl CacheBackendArg {
    /// Whether entries live in this process, out of reach of other services.
    pub fn is_in_process(self) -> bool {
        matches!(self, CacheBackendArg::Moka | CacheBackendArg::Layered)
    }
}

impl Display for BusBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BusBackendArg::None => write!(f, "none"),
            BusBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "portal-redirector")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = MYSQL_MAX_CONNECTIONS_ENV, default_value_t = 10)]
    pub mysql_max_connections: u32,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::None
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = 10_000)]
    pub cache_capacity: u64,

    #[arg(long, env = CACHE_TTL_SECS_ENV, default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    /// Event bus feeding the cache warmer. Required for the `moka` and
    /// `layered` caches when links live in MySQL, otherwise deletes made by
    /// the shortener never reach this process.
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
        required_if_eq_any([("cache", "redis"), ("cache", "layered"), ("bus", "redis")])
    )]
    pub redis_url: Option<String>,

    /// With an in-process cache, give every replica its own group so each
    /// one sees every event.
    #[arg(long, env = CONSUMER_GROUP_ENV, default_value = DEFAULT_CONSUMER_GROUP)]
    pub consumer_group: String,

    #[arg(long, env = CONSUMER_NAME_ENV, default_value = DEFAULT_CONSUMER_NAME)]
    pub consumer_name: String,

    #[arg(long, env = HIT_BUFFER_ENV, default_value_t = 10_000)]
    pub hit_buffer: usize,

    #[arg(long, env = HIT_BATCH_SIZE_ENV, default_value_t = 512)]
    pub hit_batch_size: usize,

    #[arg(long, env = HIT_FLUSH_INTERVAL_MS_ENV, default_value_t = 1_000)]
    pub hit_flush_interval_ms: u64,

    #[arg(long, env = PUBLISH_TIMEOUT_MS_ENV, default_value_t = 500)]
    pub publish_timeout_ms: u64,

    #[arg(long, env = REQUEST_TIMEOUT_MS_ENV, default_value_t = 5_000)]
    pub request_timeout_ms: u64,

    #[arg(long, env = MAX_REQUEST_TIMEOUT_MS_ENV, default_value_t = 30_000)]
    pub max_request_timeout_ms: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    #[arg(long, env = OTLP_ENDPOINT_ENV)]
    pub otlp_endpoint: Option<String>,
}

impl CLI {
    /// Rejects an in-process cache over a shared store without an event bus
    /// to invalidate it.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.is_in_process()
            && self.storage == StorageBackendArg::Mysql
            && self.bus == BusBackendArg::None
        {
            bail!(
                "cache backend '{}' needs --bus redis with mysql storage, otherwise deleted links keep redirecting",
                self.cache
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSN: &str = "mysql://root@127.0.0.1:3306/portal";
    const REDIS: &str = "redis://127.0.0.1:6379";

    fn parse(args: &[&str]) -> CLI {
        CLI::try_parse_from(std::iter::once("redirector").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_are_safe_to_run() {
        let cli = parse(&[]);
        assert_eq!(cli.cache, CacheBackendArg::None);
        assert_eq!(cli.bus, BusBackendArg::None);
        cli.validate().unwrap();
    }

    #[test]
    fn in_process_cache_over_mysql_needs_the_bus() {
        for cache in ["moka", "layered"] {
            let cli = parse(&[
                "--storage", "mysql", "--mysql-dsn", DSN, "--cache", cache, "--redis-url", REDIS,
            ]);
            assert!(cli.validate().is_err(), "{cache}");

            let cli = parse(&[
                "--storage", "mysql", "--mysql-dsn", DSN, "--cache", cache, "--redis-url", REDIS,
                "--bus", "redis",
            ]);
            cli.validate().unwrap();
        }
    }

    #[test]
    fn shared_or_single_process_caches_need_no_bus() {
        parse(&["--storage", "mysql", "--mysql-dsn", DSN, "--cache", "redis", "--redis-url", REDIS])
            .validate()
            .unwrap();
        parse(&["--cache", "moka"]).validate().unwrap();
    }
}
