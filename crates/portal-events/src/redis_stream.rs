use async_trait::async_trait;
use portal_core::{LinkEvent, LINK_CREATED_TOPIC, LINK_EXPIRED_TOPIC};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

use crate::{EventError, EventHandler, EventPublisher, Result};

/// Stream entry field holding the JSON-encoded [`LinkEvent`].
pub const PAYLOAD_FIELD: &str = "payload";

/// Read position for a consumer's own delivered-but-unacknowledged entries.
const PENDING_FROM_START: &str = "0";
/// Read position for entries never delivered to the group.
const NEW_ENTRIES: &str = ">";

fn map_publish_error(err: redis::RedisError) -> EventError {
    if err.is_timeout() {
        EventError::Timeout(err.to_string())
    } else {
        EventError::Publish(err.to_string())
    }
}

fn map_consume_error(err: redis::RedisError) -> EventError {
    if err.is_timeout() {
        EventError::Timeout(err.to_string())
    } else {
        EventError::Consume(err.to_string())
    }
}

/// Publishes events with `XADD`, one stream per topic.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    conn: ConnectionManager,
    max_len: usize,
}

impl RedisStreamPublisher {
    /// Streams are trimmed to roughly this many entries on every append.
    pub const DEFAULT_MAX_LEN: usize = 100_000;

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            max_len: Self::DEFAULT_MAX_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(map_publish_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_publish_error)?;
        Ok(Self::new(conn))
    }
}

impl std::fmt::Debug for RedisStreamPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamPublisher")
            .field("max_len", &self.max_len)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventPublisher for RedisStreamPublisher {
    async fn publish(&self, event: &LinkEvent) -> Result<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| EventError::Serialization(e.to_string()))?;

        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd_maxlen(
                event.topic(),
                StreamMaxlen::Approx(self.max_len),
                "*",
                &[(PAYLOAD_FIELD, payload)],
            )
            .await
            .map_err(map_publish_error)?;

        trace!(code = %event.code(), topic = event.topic(), id = %id, "published event");
        Ok(())
    }
}

/// Settings for a [`RedisStreamConsumer`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct StreamConsumerConfig {
    /// Consumer group shared by every replica of a service.
    #[builder(setter(into))]
    pub group: String,
    /// Unique name of this replica within the group.
    #[builder(setter(into))]
    pub consumer: String,
    #[builder(default = vec![LINK_CREATED_TOPIC.to_string(), LINK_EXPIRED_TOPIC.to_string()])]
    pub topics: Vec<String>,
    /// Entries fetched per read.
    #[builder(default = 64)]
    pub batch_size: usize,
    /// How long one read blocks waiting for new entries.
    #[builder(default = Duration::from_millis(200))]
    pub block: Duration,
    /// How often entries whose handling failed are retried.
    #[builder(default = Duration::from_secs(30))]
    pub pending_retry_interval: Duration,
    /// Where a newly created group starts reading: `$` for only new entries,
    /// `0` for the whole retained stream.
    #[builder(default = "$".to_string(), setter(into))]
    pub start_id: String,
    /// First delay before reconnecting after a failure; doubles on every
    /// consecutive failure.
    #[builder(default = Duration::from_millis(100))]
    pub reconnect_backoff: Duration,
    #[builder(default = Duration::from_secs(10))]
    pub max_reconnect_backoff: Duration,
}

/// Reads events through a Redis consumer group.
///
/// An entry is acknowledged only after its handler succeeded, which gives
/// at-least-once delivery. On start, and then every
/// `pending_retry_interval`, the consumer replays its own pending entries
/// before reading new ones.
pub struct RedisStreamConsumer {
    conn: MultiplexedConnection,
    config: StreamConsumerConfig,
}

impl RedisStreamConsumer {
    /// Opens a dedicated connection; blocking reads must not share one with
    /// request traffic.
    pub async fn connect(redis_url: &str, config: StreamConsumerConfig) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(map_consume_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_consume_error)?;
        Ok(Self { conn, config })
    }

    /// Creates the consumer group on every topic, creating streams as needed.
    pub async fn ensure_groups(&mut self) -> Result<()> {
        for topic in &self.config.topics {
            let created: redis::RedisResult<()> = self
                .conn
                .xgroup_create_mkstream(topic, &self.config.group, &self.config.start_id)
                .await;

            match created {
                Ok(()) => info!(topic = %topic, group = %self.config.group, "created consumer group"),
                Err(e) if e.code() == Some("BUSYGROUP") => {
                    trace!(topic = %topic, group = %self.config.group, "consumer group exists");
                }
                Err(e) => return Err(map_consume_error(e)),
            }
        }
        Ok(())
    }

    /// Connects and consumes events until the task is dropped.
    ///
    /// Any connection or command failure drops the connection and opens a
    /// new one after an exponential backoff, so a Redis restart only pauses
    /// consumption. Entries left pending by the failure are replayed on
    /// reconnect.
    pub async fn run_forever<H: EventHandler>(
        redis_url: String,
        config: StreamConsumerConfig,
        handler: H,
    ) {
        let mut backoff = config.reconnect_backoff;

        loop {
            let started = Instant::now();
            let outcome = match Self::connect(&redis_url, config.clone()).await {
                Ok(mut consumer) => consumer.consume(&handler).await,
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                // A consumer that ran for a while counts as healthy again.
                if started.elapsed() >= config.max_reconnect_backoff {
                    backoff = config.reconnect_backoff;
                }
                warn!(
                    group = %config.group,
                    consumer = %config.consumer,
                    error = %e,
                    retry_in_ms = backoff.as_millis() as u64,
                    "event consumer failed, reconnecting"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_reconnect_backoff);
            }
        }
    }

    /// Consumes events forever. Returns only on a Redis error.
    pub async fn run<H: EventHandler>(mut self, handler: H) -> Result<()> {
        self.consume(&handler).await
    }

    async fn consume<H: EventHandler>(&mut self, handler: &H) -> Result<()> {
        self.ensure_groups().await?;
        self.replay_pending(handler).await?;
        let mut last_replay = Instant::now();

        loop {
            if last_replay.elapsed() >= self.config.pending_retry_interval {
                self.replay_pending(handler).await?;
                last_replay = Instant::now();
            }

            let topics = self.config.topics.clone();
            let cursors = vec![NEW_ENTRIES; topics.len()];
            let reply = self.read(&topics, &cursors, true).await?;

            for stream in reply.keys {
                for entry in &stream.ids {
                    self.process(handler, &stream.key, entry).await?;
                }
            }
        }
    }

    /// Handles every entry delivered to this consumer but not yet acknowledged.
    ///
    /// Walks the pending list once; entries that fail again stay pending.
    pub async fn replay_pending<H: EventHandler>(&mut self, handler: &H) -> Result<usize> {
        let mut replayed = 0;

        for topic in self.config.topics.clone() {
            let mut cursor = PENDING_FROM_START.to_string();
            loop {
                let reply = self
                    .read(std::slice::from_ref(&topic), &[cursor.as_str()], false)
                    .await?;

                let entries: Vec<StreamId> = reply
                    .keys
                    .into_iter()
                    .flat_map(|stream| stream.ids)
                    .collect();

                let Some(last) = entries.last() else {
                    break;
                };
                cursor = last.id.clone();

                for entry in &entries {
                    self.process(handler, &topic, entry).await?;
                    replayed += 1;
                }
            }
        }

        if replayed > 0 {
            info!(replayed, "replayed pending events");
        }
        Ok(replayed)
    }

    async fn read(
        &mut self,
        topics: &[String],
        cursors: &[&str],
        block: bool,
    ) -> Result<StreamReadReply> {
        let mut options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(self.config.batch_size);
        if block {
            options = options.block(self.config.block.as_millis() as usize);
        }

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(topics, cursors, &options)
            .await
            .map_err(map_consume_error)?;

        Ok(reply.unwrap_or_default())
    }

    /// Hands one entry to `handler`, acknowledging it on success.
    async fn process<H: EventHandler>(
        &mut self,
        handler: &H,
        topic: &str,
        entry: &StreamId,
    ) -> Result<()> {
        let event = match decode(entry) {
            Ok(event) => event,
            Err(e) => {
                // Undecodable entries can never succeed; drop them.
                warn!(topic = %topic, id = %entry.id, error = %e, "discarding malformed event");
                return self.ack(topic, &entry.id).await;
            }
        };

        match handler.handle(&event).await {
            Ok(()) => {
                debug!(code = %event.code(), topic = %topic, id = %entry.id, "handled event");
                self.ack(topic, &entry.id).await
            }
            Err(e) => {
                warn!(code = %event.code(), topic = %topic, id = %entry.id, error = %e, "event handler failed, leaving entry pending");
                Ok(())
            }
        }
    }

    async fn ack(&mut self, topic: &str, id: &str) -> Result<()> {
        let _: i64 = self
            .conn
            .xack(topic, &self.config.group, &[id])
            .await
            .map_err(map_consume_error)?;
        Ok(())
    }
}

fn decode(entry: &StreamId) -> Result<LinkEvent> {
    let payload: String = entry
        .get(PAYLOAD_FIELD)
        .ok_or_else(|| EventError::Consume(format!("entry has no '{PAYLOAD_FIELD}' field")))?;
    serde_json::from_str(&payload).map_err(|e| EventError::Serialization(e.to_string()))
}
