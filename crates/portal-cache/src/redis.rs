use async_trait::async_trait;
use portal_core::{cache_key, CacheError, LinkCache, ShortCode, ShortLink};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::Result;

/// A Redis-backed [`LinkCache`].
///
/// Links are stored as JSON under `shortlink:{code}` with `SET EX`, so Redis
/// drops every entry on its own once its TTL elapses. The connection manager
/// reconnects transparently after the server goes away.
#[derive(Clone)]
pub struct RedisLinkCache {
    conn: ConnectionManager,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisLinkCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Opens a managed connection to `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("invalid redis url", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("failed to connect to redis", e))?;
        Ok(Self::new(conn))
    }
}

impl std::fmt::Debug for RedisLinkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLinkCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl LinkCache for RedisLinkCache {
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        let key = cache_key(code);
        let mut conn = self.conn.clone();

        let cached: Option<String> = conn.get(&key).await.map_err(|e| {
            warn!(code = %code, error = %e, "redis error on get");
            map_redis_error("failed to fetch value from redis", e)
        })?;

        let Some(cached) = cached else {
            trace!(code = %code, "cache miss in redis");
            return Ok(None);
        };

        debug!(code = %code, "cache hit in redis");
        serde_json::from_str::<ShortLink>(&cached)
            .map(Some)
            .map_err(|e| {
                warn!(code = %code, error = %e, "failed to deserialize cached link");
                CacheError::InvalidData(format!("invalid cached value for key '{key}': {e}"))
            })
    }

    async fn put(&self, code: &ShortCode, link: &ShortLink, ttl: Duration) -> Result<()> {
        let key = cache_key(code);
        let json = serde_json::to_string(link)
            .map_err(|e| CacheError::Serialization(format!("failed to serialize link: {e}")))?;

        // SET EX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, json, seconds)
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "failed to cache link in redis");
                map_redis_error("failed to write value to redis", e)
            })?;

        trace!(code = %code, ttl_secs = seconds, "cached link in redis");
        Ok(())
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        let key = cache_key(code);
        let mut conn = self.conn.clone();

        conn.del::<_, ()>(&key).await.map_err(|e| {
            warn!(code = %code, error = %e, "failed to remove link from redis");
            map_redis_error("failed to delete value from redis", e)
        })?;

        trace!(code = %code, "invalidated link in redis");
        Ok(())
    }
}
