//! Response shapes of the vitalsd HTTP API.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub severity: String,
    pub reasons: Vec<String>,
}

impl Status {
    pub fn is_warning(&self) -> bool {
        self.severity == "warning"
    }

    pub fn describe(&self) -> String {
        self.reasons
            .iter()
            .map(|r| match r.as_str() {
                "cpu" => "High CPU usage",
                "memory" => "High Memory usage",
                "disk" => "High Disk usage",
                _ => "All systems normal",
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthEvent {
    pub snapshot: Snapshot,
    pub status: Status,
}

/// `GET /health`
#[derive(Debug, Deserialize)]
pub struct LiveHealth {
    pub snapshot: Snapshot,
    pub status: Status,
    pub uptime: String,
}

#[derive(Debug, Deserialize)]
pub struct Counters {
    pub ticks: u64,
    pub snapshots_recorded: u64,
    pub collection_errors: u64,
    pub storage_errors: u64,
    pub sink_deliveries: u64,
    pub sink_failures: u64,
}

/// `GET /status`
#[derive(Debug, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_s: u64,
    pub interval_seconds: u64,
    pub history_len: usize,
    pub max_entries: usize,
    #[serde(default)]
    pub sinks: Vec<String>,
    pub counters: Counters,
}

#[derive(Debug, Deserialize)]
pub struct ProcessUsage {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct TopProcesses {
    pub processes: Vec<ProcessUsage>,
}
