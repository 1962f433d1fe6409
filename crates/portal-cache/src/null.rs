use async_trait::async_trait;
use portal_core::{LinkCache, ShortCode, ShortLink};
use std::time::Duration;

use crate::Result;

/// A cache that stores nothing. Every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl LinkCache for NullCache {
    async fn get(&self, _code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(None)
    }

    async fn put(&self, _code: &ShortCode, _link: &ShortLink, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, _code: &ShortCode) -> Result<()> {
        Ok(())
    }
}
