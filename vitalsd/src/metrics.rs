use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-lifetime counters reported on `/status`.
#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    ticks: AtomicU64,
    snapshots_recorded: AtomicU64,
    collection_errors: AtomicU64,
    storage_errors: AtomicU64,
    sink_deliveries: AtomicU64,
    sink_failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uptime_s: u64,
    pub ticks: u64,
    pub snapshots_recorded: u64,
    pub collection_errors: u64,
    pub storage_errors: u64,
    pub sink_deliveries: u64,
    pub sink_failures: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            ticks: AtomicU64::new(0),
            snapshots_recorded: AtomicU64::new(0),
            collection_errors: AtomicU64::new(0),
            storage_errors: AtomicU64::new(0),
            sink_deliveries: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snapshots_recorded(&self) {
        self.snapshots_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_collection_errors(&self) {
        self.collection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_storage_errors(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sink_deliveries(&self) {
        self.sink_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sink_failures(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_s: self.uptime_secs(),
            ticks: self.ticks(),
            snapshots_recorded: self.snapshots_recorded.load(Ordering::Relaxed),
            collection_errors: self.collection_errors.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            sink_deliveries: self.sink_deliveries.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}
