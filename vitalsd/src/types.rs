use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// On-disk and on-wire timestamp layout, second precision, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const REASON_CPU: &str = "cpu";
pub const REASON_MEMORY: &str = "memory";
pub const REASON_DISK: &str = "disk";
pub const REASON_NORMAL: &str = "all systems normal";

/// Current local wall-clock time truncated to whole seconds.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Raw utilization figures as reported by a metrics source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    /// Unix epoch seconds
    pub boot_time: u64,
}

/// One point-in-time measurement. This is exactly what a history file record
/// looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl Snapshot {
    pub fn new(timestamp: NaiveDateTime, cpu: f64, memory: f64, disk: f64) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            cpu_percent: clamp_percent(cpu),
            memory_percent: clamp_percent(memory),
            disk_percent: clamp_percent(disk),
        }
    }

    pub fn from_reading(timestamp: NaiveDateTime, reading: &Reading) -> Self {
        Self::new(
            timestamp,
            reading.cpu_percent,
            reading.memory_percent,
            reading.disk_percent,
        )
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

// NaN would serialize as `null` and make the whole file unreadable on reload.
fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
}

/// Classification of a snapshot against the active thresholds. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub severity: Severity,
    pub reasons: Vec<&'static str>,
}

impl Status {
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Human-readable status lines used by chat reports.
    pub fn messages(&self) -> Vec<&'static str> {
        self.reasons
            .iter()
            .map(|reason| match *reason {
                REASON_CPU => "High CPU usage",
                REASON_MEMORY => "High Memory usage",
                REASON_DISK => "High Disk usage",
                _ => "All systems normal",
            })
            .collect()
    }
}

/// What every sink receives after a snapshot has been made durable.
#[derive(Debug, Clone, Serialize)]
pub struct HealthEvent {
    pub snapshot: Snapshot,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessUsage {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    /// Established TCP connections; `None` where the platform does not expose them.
    pub connections: Option<usize>,
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(de)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(D::Error::custom)
    }
}
