use portal_core::{Repository, ShortCode};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct HitCounterConfig {
    /// Hits buffered before new ones are dropped.
    #[builder(default = 10_000)]
    pub capacity: usize,
    /// Buffered hits that trigger an early flush.
    #[builder(default = 512)]
    pub batch_size: usize,
    #[builder(default = Duration::from_secs(1))]
    pub flush_interval: Duration,
}

impl Default for HitCounterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Records redirects off the request path.
///
/// Hits go through a bounded channel to a background worker that sums them
/// per code and writes them with `increment_hits`. A full buffer drops the
/// hit instead of slowing the redirect down, so counts are approximate.
/// Dropping every handle stops the worker after a final flush.
#[derive(Debug, Clone)]
pub struct HitCounter {
    tx: Sender<ShortCode>,
}

impl HitCounter {
    /// Starts the flush worker on the current runtime.
    pub fn spawn<R: Repository>(repository: R, config: HitCounterConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let worker = HitWorker {
            repository,
            rx,
            pending: HashMap::new(),
            buffered: 0,
            config,
        };

        (Self { tx }, tokio::spawn(worker.run()))
    }

    /// Queues one hit. Returns `false` if it was dropped.
    pub fn record(&self, code: &ShortCode) -> bool {
        match self.tx.try_send(code.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(code = %code, "hit buffer full, dropping hit");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(code = %code, "hit counter stopped, dropping hit");
                false
            }
        }
    }
}

struct HitWorker<R> {
    repository: R,
    rx: Receiver<ShortCode>,
    pending: HashMap<ShortCode, u64>,
    buffered: usize,
    config: HitCounterConfig,
}

impl<R: Repository> HitWorker<R> {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(code) => {
                        *self.pending.entry(code).or_insert(0) += 1;
                        self.buffered += 1;
                        if self.buffered >= self.config.batch_size {
                            self.flush().await;
                        }
                    }
                    None => {
                        self.flush().await;
                        debug!("hit counter stopped");
                        return;
                    }
                },
                _ = ticker.tick() => self.flush().await,
            }
        }
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.pending);
        self.buffered = 0;
        trace!(codes = batch.len(), "flushing hit counts");

        for (code, hits) in batch {
            if let Err(e) = self.repository.increment_hits(&code, hits).await {
                warn!(code = %code, hits, error = %e, "failed to flush hit count");
            }
        }
    }
}
