//! The sampling-evaluation-persistence loop.
//!
//! The sampler task produces snapshots and passes them over a channel to the
//! recorder, which persists, evaluates and fans out one snapshot at a time.
//! Readers (API handlers, chat commands) only ever touch the history store.

use crate::error::StorageError;
use crate::evaluator::{Thresholds, evaluate};
use crate::fanout::FanOut;
use crate::history::HistoryStore;
use crate::metrics::Metrics;
use crate::sampler::Sampler;
use crate::source::MetricsSource;
use crate::types::{HealthEvent, Snapshot, Status};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Everything one tick needs, passed explicitly instead of living in globals.
pub struct MonitorContext {
    pub thresholds: Thresholds,
    pub history: Arc<HistoryStore>,
    pub source: Arc<dyn MetricsSource>,
    pub fanout: FanOut,
    pub metrics: Arc<Metrics>,
}

impl MonitorContext {
    pub fn evaluate(&self, snapshot: &Snapshot) -> Status {
        evaluate(snapshot, &self.thresholds)
    }

    /// Latest stored snapshot with its status under the current thresholds.
    pub fn latest_event(&self) -> Option<HealthEvent> {
        self.history.latest().map(|snapshot| self.event_for(snapshot))
    }

    pub fn event_for(&self, snapshot: Snapshot) -> HealthEvent {
        let status = self.evaluate(&snapshot);
        HealthEvent { snapshot, status }
    }

    /// Make `snapshot` durable, then evaluate it and fan it out. When the
    /// write fails nothing is delivered.
    pub async fn record(&self, snapshot: Snapshot) -> Result<Status, StorageError> {
        let history = Arc::clone(&self.history);
        let stored = snapshot.clone();
        tokio::task::spawn_blocking(move || history.append(stored))
            .await
            .map_err(|err| StorageError::Write {
                path: self.history.path().to_path_buf(),
                source: std::io::Error::other(err),
            })??;
        self.metrics.inc_snapshots_recorded();

        let event = self.event_for(snapshot);
        let delivered = self.fanout.deliver(&event).await;
        debug!(
            "[monitor] recorded {} ({:?}), delivered to {delivered}/{} sinks",
            event.snapshot.timestamp_string(),
            event.status.severity,
            self.fanout.len()
        );
        Ok(event.status)
    }
}

/// Run sampler and recorder until `shutdown` is raised. Returns once the
/// snapshots already produced have been recorded.
pub async fn run(ctx: Arc<MonitorContext>, interval: Duration, shutdown: watch::Receiver<bool>) {
    let sampler = Sampler::new(Arc::clone(&ctx.source), Arc::clone(&ctx.metrics))
        .resume_after(ctx.history.latest().map(|s| s.timestamp));
    run_with_sampler(ctx, sampler, interval, shutdown).await;
}

pub async fn run_with_sampler(
    ctx: Arc<MonitorContext>,
    sampler: Sampler,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    // capacity 1: the sampler waits for the recorder instead of piling up ticks
    let (tx, mut rx) = mpsc::channel::<Snapshot>(1);
    let sampler_task = tokio::spawn(sampler.run(interval, tx, shutdown));

    info!(
        "[monitor] recording to {} (max {} entries)",
        ctx.history.path().display(),
        ctx.history.capacity()
    );

    while let Some(snapshot) = rx.recv().await {
        if let Err(err) = ctx.record(snapshot).await {
            ctx.metrics.inc_storage_errors();
            error!("[monitor] {err}; skipping notifications for this sample");
        }
    }

    if let Err(err) = sampler_task.await {
        warn!("[monitor] sampler task ended abnormally: {err}");
    }
    info!("[monitor] stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollectionError, SinkError};
    use crate::fanout::{DEFAULT_SINK_TIMEOUT, Sink};
    use crate::types::{Reading, Severity};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Returns the scripted outcomes in order, then fails forever.
    struct Scripted(Mutex<VecDeque<Option<f64>>>);

    impl Scripted {
        fn new(outcomes: &[Option<f64>]) -> Self {
            Self(Mutex::new(outcomes.iter().copied().collect()))
        }
    }

    impl MetricsSource for Scripted {
        fn collect(&self) -> Result<Reading, CollectionError> {
            match self.0.lock().unwrap().pop_front().flatten() {
                Some(cpu) => Ok(Reading {
                    cpu_percent: cpu,
                    memory_percent: 40.0,
                    disk_percent: 50.0,
                    boot_time: 0,
                }),
                None => Err(CollectionError::new("source offline")),
            }
        }
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<HealthEvent>>);

    #[async_trait]
    impl Sink for Collecting {
        fn name(&self) -> &str {
            "collecting"
        }

        async fn deliver(&self, event: &HealthEvent) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn context(
        history_path: std::path::PathBuf,
        source: Scripted,
        sink: Arc<Collecting>,
    ) -> Arc<MonitorContext> {
        let metrics = Arc::new(Metrics::new());
        let mut fanout = FanOut::new(Arc::clone(&metrics), DEFAULT_SINK_TIMEOUT);
        fanout.register(sink);
        Arc::new(MonitorContext {
            thresholds: Thresholds::default(),
            history: Arc::new(HistoryStore::open(history_path, 100)),
            source: Arc::new(source),
            fanout,
            metrics,
        })
    }

    #[tokio::test]
    async fn failed_tick_leaves_no_gap() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(Collecting::default());
        let outcomes = [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)];
        let ctx = context(dir.path().join("h.json"), Scripted::new(&outcomes), sink.clone());

        let mut sampler = Sampler::new(Arc::clone(&ctx.source), Arc::clone(&ctx.metrics));
        for _ in 0..5 {
            if let Some(snapshot) = sampler.tick().await {
                ctx.record(snapshot).await.unwrap();
            }
        }

        let cpus: Vec<f64> = ctx.history.all().iter().map(|s| s.cpu_percent).collect();
        assert_eq!(cpus, vec![1.0, 2.0, 4.0, 5.0]);
        assert_eq!(sink.0.lock().unwrap().len(), 4);
        assert_eq!(ctx.metrics.snapshot().collection_errors, 1);
    }

    #[tokio::test]
    async fn write_failure_suppresses_fanout() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let sink = Arc::new(Collecting::default());
        let ctx = context(blocker.join("h.json"), Scripted::new(&[]), sink.clone());

        let snapshot = Snapshot::new(crate::types::local_now(), 99.0, 1.0, 1.0);
        let err = ctx.record(snapshot).await.unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
        assert!(ctx.history.latest().is_none());
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recorded_status_reflects_thresholds() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(Collecting::default());
        let ctx = context(dir.path().join("h.json"), Scripted::new(&[]), sink.clone());

        let snapshot = Snapshot::new(crate::types::local_now(), 85.0, 50.0, 20.0);
        let status = ctx.record(snapshot).await.unwrap();
        assert_eq!(status.severity, Severity::Warning);
        assert_eq!(status.reasons, vec!["cpu"]);

        let delivered = sink.0.lock().unwrap();
        assert_eq!(delivered[0].status, status);
        assert_eq!(ctx.latest_event().unwrap().status, status);
    }

    #[tokio::test]
    async fn loop_records_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(Collecting::default());
        let outcomes = [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)];
        let ctx = context(dir.path().join("h.json"), Scripted::new(&outcomes), sink.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(
            Arc::clone(&ctx),
            Duration::from_millis(5),
            shutdown_rx,
        ));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while ctx.metrics.ticks() < 7 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        let cpus: Vec<f64> = ctx.history.all().iter().map(|s| s.cpu_percent).collect();
        assert_eq!(cpus, vec![1.0, 2.0, 4.0, 5.0]);
        let delivered: Vec<f64> = sink
            .0
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.snapshot.cpu_percent)
            .collect();
        assert_eq!(delivered, cpus, "sinks see events in append order");
    }
}
