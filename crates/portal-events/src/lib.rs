//! Link lifecycle events: publishing, consuming and the cache-warming consumer.
//!
//! Delivery is at least once. Handlers must be idempotent per short code.

pub mod error;
pub mod memory;
pub mod redis_stream;
pub mod warmer;

use async_trait::async_trait;
use portal_core::LinkEvent;
use std::sync::Arc;
use std::time::Duration;

pub use error::{EventError, Result};
pub use memory::{InMemoryBus, InMemoryReceiver};
pub use redis_stream::{RedisStreamConsumer, RedisStreamPublisher, StreamConsumerConfig};
pub use warmer::CacheWarmer;

#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    async fn publish(&self, event: &LinkEvent) -> Result<()>;
}

/// Reacts to one delivered event.
///
/// Returning an error leaves the event eligible for redelivery.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &LinkEvent) -> Result<()>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: &LinkEvent) -> Result<()> {
        (**self).publish(event).await
    }
}

#[async_trait]
impl<T: EventHandler + ?Sized> EventHandler for Arc<T> {
    async fn handle(&self, event: &LinkEvent) -> Result<()> {
        (**self).handle(event).await
    }
}

/// A publisher that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: &LinkEvent) -> Result<()> {
        Ok(())
    }
}

/// Publishes `event`, giving up after `timeout`.
pub async fn publish_with_timeout<P>(publisher: &P, event: &LinkEvent, timeout: Duration) -> Result<()>
where
    P: EventPublisher + ?Sized,
{
    match tokio::time::timeout(timeout, publisher.publish(event)).await {
        Ok(result) => result,
        Err(_) => Err(EventError::Timeout(format!(
            "publishing {} for {} took longer than {timeout:?}",
            event.topic(),
            event.code()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::ShortCode;

    struct SlowPublisher;

    #[async_trait]
    impl EventPublisher for SlowPublisher {
        async fn publish(&self, _event: &LinkEvent) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_times_out() {
        let event = LinkEvent::expired(ShortCode::new_unchecked("aZ3kQ1"));

        let err = publish_with_timeout(&SlowPublisher, &event, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, EventError::Timeout(_)));
    }

    #[tokio::test]
    async fn noop_publisher_accepts_everything() {
        let event = LinkEvent::expired(ShortCode::new_unchecked("aZ3kQ1"));
        publish_with_timeout(&NoopPublisher, &event, Duration::from_millis(100))
            .await
            .unwrap();
    }
}
