//! Keyword poller: a cancellable interval task that reads the detector's
//! keyword slot and hands non-empty keywords to a dispatch callback.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancellation::guarded;
use crate::error::IveeError;
use crate::keyword::KeywordEngine;
use crate::metrics::{metric_names, MetricsRegistry};

pub struct KeywordPoller {
    engine: Arc<dyn KeywordEngine>,
    interval: Duration,
    poll_timeout: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl KeywordPoller {
    pub fn new(
        engine: Arc<dyn KeywordEngine>,
        interval: Duration,
        poll_timeout: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            engine,
            interval,
            poll_timeout,
            metrics,
        }
    }

    /// Spawn the polling loop. It runs until `token` is cancelled.
    /// `on_keyword` must not block: dispatch is fire-and-forget relative to the timer.
    pub fn spawn<K, E>(self, token: CancellationToken, generation: u64, on_keyword: K, on_error: E) -> JoinHandle<()>
    where
        K: Fn(String) + Send + Sync + 'static,
        E: Fn(IveeError) + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            info!(generation, interval_ms = self.interval.as_millis() as u64, "keyword poller started");
            self.run(&token, on_keyword, on_error).await;
            info!(generation, "keyword poller stopped");
        })
    }

    async fn run<K, E>(&self, token: &CancellationToken, on_keyword: K, on_error: E)
    where
        K: Fn(String),
        E: Fn(IveeError),
    {
        // first poll one interval after start
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let span = self.metrics.span(metric_names::POLL);
            let polled = guarded("poll", self.poll_timeout, token, self.engine.last_keyword()).await;
            span.finish();

            match polled {
                Ok(Some(keyword)) if !keyword.is_empty() => {
                    debug!(keyword = %keyword, "keyword polled");
                    on_keyword(keyword);
                }
                Ok(_) => {}
                Err(IveeError::Cancelled(_)) => return,
                Err(e) => {
                    warn!(error = %e, "keyword poll failed");
                    on_error(e);
                }
            }
        }
    }
}
