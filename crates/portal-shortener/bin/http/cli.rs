use clap::{Parser, ValueEnum};
use portal_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "PORTAL_SHORTENER_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "PORTAL_SHORTENER_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "PORTAL_SHORTENER_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "PORTAL_SHORTENER_MYSQL_DSN";
pub const MYSQL_MAX_CONNECTIONS_ENV: &str = "PORTAL_SHORTENER_MYSQL_MAX_CONNECTIONS";
pub const CREATE_SCHEMA_ENV: &str = "PORTAL_SHORTENER_CREATE_SCHEMA";
pub const CACHE_BACKEND_ENV: &str = "PORTAL_SHORTENER_CACHE_BACKEND";
pub const CACHE_CAPACITY_ENV: &str = "PORTAL_SHORTENER_CACHE_CAPACITY";
pub const CACHE_TTL_SECS_ENV: &str = "PORTAL_SHORTENER_CACHE_TTL_SECS";
pub const BUS_BACKEND_ENV: &str = "PORTAL_SHORTENER_BUS_BACKEND";
pub const REDIS_URL_ENV: &str = "PORTAL_SHORTENER_REDIS_URL";
pub const GENERATOR_ENV: &str = "PORTAL_SHORTENER_GENERATOR";
pub const CODE_LENGTH_ENV: &str = "PORTAL_SHORTENER_CODE_LENGTH";
pub const SEQUENCE_START_ENV: &str = "PORTAL_SHORTENER_SEQUENCE_START";
pub const MAX_ATTEMPTS_ENV: &str = "PORTAL_SHORTENER_MAX_ATTEMPTS";
pub const DEFAULT_TTL_SECS_ENV: &str = "PORTAL_SHORTENER_DEFAULT_TTL_SECS";
pub const MAX_TTL_DAYS_ENV: &str = "PORTAL_SHORTENER_MAX_TTL_DAYS";
pub const PUBLISH_TIMEOUT_MS_ENV: &str = "PORTAL_SHORTENER_PUBLISH_TIMEOUT_MS";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "PORTAL_SHORTENER_REQUEST_TIMEOUT_MS";
pub const MAX_REQUEST_TIMEOUT_MS_ENV: &str = "PORTAL_SHORTENER_MAX_REQUEST_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "PORTAL_SHORTENER_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "PORTAL_SHORTENER_OTLP_ENDPOINT";

/// Upper bound for day-valued settings, about a century.
pub const MAX_DAYS: i64 = 36_500;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8081";

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

impl Display for BusBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BusBackendArg::None => write!(f, "none"),
            BusBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeneratorArg {
    #[value(name = "random")]
    Random,
    #[value(name = "scrambled")]
    Scrambled,
}

impl Display for GeneratorArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorArg::Random => write!(f, "random"),
            GeneratorArg::Scrambled => write!(f, "scrambled"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "portal-shortener")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Public origin of the redirector, prefixed to every short code.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

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

    /// Create the `short_links` table on startup if it is missing.
    #[arg(long, env = CREATE_SCHEMA_ENV, default_value_t = false)]
    pub create_schema: bool,

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

    #[arg(
        long,
        env = GENERATOR_ENV,
        value_enum,
        default_value_t = GeneratorArg::Random
    )]
    pub generator: GeneratorArg,

    #[arg(long, env = CODE_LENGTH_ENV, default_value_t = 7)]
    pub code_length: usize,

    /// First counter value of the scrambled generator. Give each instance a
    /// disjoint range.
    #[arg(long, env = SEQUENCE_START_ENV, default_value_t = 0)]
    pub sequence_start: u64,

    #[arg(long, env = MAX_ATTEMPTS_ENV, default_value_t = 5)]
    pub max_attempts: usize,

    /// Lifetime of links created without a TTL. Unset means they never expire.
    #[arg(long, env = DEFAULT_TTL_SECS_ENV)]
    pub default_ttl_secs: Option<i64>,

    #[arg(
        long,
        env = MAX_TTL_DAYS_ENV,
        default_value_t = 365,
        value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS)
    )]
    pub max_ttl_days: i64,

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_ttl_days_must_be_in_range() {
        for days in ["0", "-5", "36501", "9223372036854775807"] {
            let arg = format!("--max-ttl-days={days}");
            assert!(
                CLI::try_parse_from(["shortener", arg.as_str()]).is_err(),
                "{days} should be rejected"
            );
        }

        let cli = CLI::try_parse_from(["shortener"]).unwrap();
        assert_eq!(cli.max_ttl_days, 365);
        assert_eq!(cli.cache, CacheBackendArg::None);
    }
}
