use jiff::{SignedDuration, Timestamp};
use portal_core::{LinkCache, LinkEvent, Repository};
use portal_events::{publish_with_timeout, EventPublisher};
use std::time::Duration;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::error::Result;

#[derive(Debug, Clone, TypedBuilder)]
pub struct JanitorConfig {
    /// Links soft-deleted per sweep batch.
    #[builder(default = 500)]
    pub batch_size: usize,
    /// Hard-delete rows soft-deleted longer ago than this. `None` keeps them.
    #[builder(default)]
    pub purge_after: Option<SignedDuration>,
    #[builder(default = Duration::from_millis(500))]
    pub publish_timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorReport {
    pub expired: usize,
    pub purged: u64,
}

/// Out-of-band maintenance over the link store.
///
/// A pass soft-deletes every link whose expiry has passed, evicts it from the
/// cache and announces `LinkExpired`, then optionally purges old soft-deleted
/// rows.
pub struct Janitor<R, C, P> {
    repository: R,
    cache: C,
    publisher: P,
    config: JanitorConfig,
}

impl<R, C, P> Janitor<R, C, P>
where
    R: Repository,
    C: LinkCache,
    P: EventPublisher,
{
    pub fn new(repository: R, cache: C, publisher: P, config: JanitorConfig) -> Self {
        Self {
            repository,
            cache,
            publisher,
            config,
        }
    }

    pub async fn run_once(&self, now: Timestamp) -> Result<JanitorReport> {
        let mut report = JanitorReport::default();
        let batch_size = self.config.batch_size.max(1);

        loop {
            let swept = self.repository.sweep_expired(now, batch_size).await?;
            let done = swept.len() < batch_size;

            for code in swept {
                if let Err(e) = self.cache.invalidate(&code).await {
                    warn!(code = %code, error = %e, "failed to evict expired link");
                }
                let event = LinkEvent::expired(code);
                if let Err(e) =
                    publish_with_timeout(&self.publisher, &event, self.config.publish_timeout).await
                {
                    warn!(code = %event.code(), error = %e, "failed to publish expiry");
                }
                report.expired += 1;
            }

            if done {
                break;
            }
        }

        if let Some(retention) = self.config.purge_after {
            match purge_cutoff(now, retention) {
                Some(before) => report.purged = self.repository.purge_deleted(before).await?,
                None => warn!(retention = %retention, "purge retention out of range, skipping purge"),
            }
        }

        info!(expired = report.expired, purged = report.purged, "janitor pass finished");
        Ok(report)
    }
}

/// Rows soft-deleted before the returned instant may be purged. A retention
/// that is not positive, or reaches before the earliest timestamp, purges
/// nothing.
fn purge_cutoff(now: Timestamp, retention: SignedDuration) -> Option<Timestamp> {
    if retention.is_negative() || retention.is_zero() {
        return None;
    }
    now.checked_sub(retention).ok()
}
