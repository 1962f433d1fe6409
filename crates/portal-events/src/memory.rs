use async_trait::async_trait;
use portal_core::LinkEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{EventError, EventHandler, EventPublisher, Result};

const HANDLE_ATTEMPTS: usize = 3;

/// Publishing half of an in-process event bus.
///
/// Backed by a bounded tokio channel. `publish` waits for room, so a slow
/// consumer applies back-pressure to producers.
#[derive(Debug, Clone)]
pub struct InMemoryBus {
    tx: mpsc::Sender<LinkEvent>,
}

/// Consuming half of an [`InMemoryBus`].
#[derive(Debug)]
pub struct InMemoryReceiver {
    rx: mpsc::Receiver<LinkEvent>,
}

impl InMemoryBus {
    pub fn channel(capacity: usize) -> (InMemoryBus, InMemoryReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (InMemoryBus { tx }, InMemoryReceiver { rx })
    }
}

#[async_trait]
impl EventPublisher for InMemoryBus {
    async fn publish(&self, event: &LinkEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| EventError::Publish("in-memory bus receiver is gone".to_string()))
    }
}

impl InMemoryReceiver {
    /// Takes the next event, or `None` once every publisher is dropped.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.rx.recv().await
    }

    /// Feeds every event to `handler` until all publishers are dropped.
    ///
    /// A failing event is retried a few times, then dropped.
    pub async fn run<H: EventHandler>(mut self, handler: H) {
        while let Some(event) = self.rx.recv().await {
            for attempt in 1..=HANDLE_ATTEMPTS {
                match handler.handle(&event).await {
                    Ok(()) => {
                        debug!(code = %event.code(), topic = event.topic(), "handled event");
                        break;
                    }
                    Err(e) if attempt < HANDLE_ATTEMPTS => {
                        warn!(code = %event.code(), attempt, error = %e, "event handler failed, retrying");
                    }
                    Err(e) => {
                        warn!(code = %event.code(), error = %e, "event handler failed, dropping event");
                    }
                }
            }
        }
        debug!("in-memory bus closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::ShortCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<LinkEvent>>,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &LinkEvent) -> Result<()> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(EventError::Consume("flaky".to_string()));
            }
            self.seen.lock().await.push(event.clone());
            Ok(())
        }
    }

    fn expired(code: &str) -> LinkEvent {
        LinkEvent::expired(ShortCode::new_unchecked(code))
    }

    #[tokio::test]
    async fn delivers_in_order_until_closed() {
        let (bus, receiver) = InMemoryBus::channel(8);
        let recorder = Arc::new(Recorder::default());

        bus.publish(&expired("aaaaa1")).await.unwrap();
        bus.publish(&expired("aaaaa2")).await.unwrap();
        drop(bus);

        receiver.run(Arc::clone(&recorder)).await;

        let seen = recorder.seen.lock().await;
        assert_eq!(*seen, vec![expired("aaaaa1"), expired("aaaaa2")]);
    }

    #[tokio::test]
    async fn retries_failed_events() {
        let (bus, receiver) = InMemoryBus::channel(8);
        let recorder = Arc::new(Recorder {
            failures_left: AtomicUsize::new(2),
            ..Default::default()
        });

        bus.publish(&expired("aaaaa1")).await.unwrap();
        drop(bus);

        receiver.run(Arc::clone(&recorder)).await;

        assert_eq!(recorder.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_fails_once_receiver_is_dropped() {
        let (bus, receiver) = InMemoryBus::channel(1);
        drop(receiver);

        let err = bus.publish(&expired("aaaaa1")).await.unwrap_err();
        assert!(matches!(err, EventError::Publish(_)));
    }
}
