//! Periodic collection.
//!
//! One tick runs at a time. The loop measures how long a tick took and sleeps
//! only for the rest of the interval, so slow collection does not make the
//! schedule drift, and an overrunning tick is followed immediately by the next
//! one instead of queueing.

use crate::metrics::Metrics;
use crate::source::MetricsSource;
use crate::types::{Snapshot, local_now};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep};

pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct Sampler {
    source: Arc<dyn MetricsSource>,
    metrics: Arc<Metrics>,
    clock: Clock,
    last_timestamp: Option<NaiveDateTime>,
}

impl Sampler {
    pub fn new(source: Arc<dyn MetricsSource>, metrics: Arc<Metrics>) -> Self {
        Self {
            source,
            metrics,
            clock: Box::new(local_now),
            last_timestamp: None,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Never hand out a timestamp older than `last`, typically the newest
    /// persisted snapshot.
    pub fn resume_after(mut self, last: Option<NaiveDateTime>) -> Self {
        self.last_timestamp = last;
        self
    }

    /// Collect once. `None` means the source failed and this tick produced
    /// nothing.
    pub async fn tick(&mut self) -> Option<Snapshot> {
        self.metrics.inc_ticks();

        let source = Arc::clone(&self.source);
        let reading = match tokio::task::spawn_blocking(move || source.collect()).await {
            Ok(Ok(reading)) => reading,
            Ok(Err(err)) => {
                self.metrics.inc_collection_errors();
                warn!("[sampler] skipping tick: {err}");
                return None;
            }
            Err(err) => {
                self.metrics.inc_collection_errors();
                warn!("[sampler] collection task failed: {err}");
                return None;
            }
        };

        let mut timestamp = (self.clock)();
        if let Some(last) = self.last_timestamp
            && timestamp < last
        {
            debug!("[sampler] clock went backwards ({timestamp} < {last}); holding at {last}");
            timestamp = last;
        }
        self.last_timestamp = Some(timestamp);

        Some(Snapshot::from_reading(timestamp, &reading))
    }

    /// Tick every `interval` until `shutdown` flips to true (or its sender is
    /// dropped), handing snapshots to `tx`. Shutdown is only observed between
    /// ticks.
    pub async fn run(
        mut self,
        interval: Duration,
        tx: mpsc::Sender<Snapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("[sampler] sampling every {:?}", interval);

        while !*shutdown.borrow() {
            let started = Instant::now();

            if let Some(snapshot) = self.tick().await
                && tx.send(snapshot).await.is_err()
            {
                warn!("[sampler] recorder is gone; stopping");
                break;
            }

            let pause = interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("[sampler] stopped");
    }
}
