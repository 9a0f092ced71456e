//! Threshold evaluation.
//!
//! `evaluate` holds no state, so re-running it over stored snapshots with a
//! different set of thresholds is always valid.

use crate::types::{
    REASON_CPU, REASON_DISK, REASON_MEMORY, REASON_NORMAL, Severity, Snapshot, Status,
};
use serde::{Deserialize, Serialize};

/// Percentage breakpoints at or above which a metric counts as a warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_warn: f64,
    pub mem_warn: f64,
    pub disk_warn: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_warn: 85.0,
            mem_warn: 90.0,
            disk_warn: 90.0,
        }
    }
}

/// Classify a snapshot. Comparisons are inclusive and reasons always come out
/// in cpu, memory, disk order.
pub fn evaluate(snapshot: &Snapshot, thresholds: &Thresholds) -> Status {
    let checks = [
        (snapshot.cpu_percent >= thresholds.cpu_warn, REASON_CPU),
        (snapshot.memory_percent >= thresholds.mem_warn, REASON_MEMORY),
        (snapshot.disk_percent >= thresholds.disk_warn, REASON_DISK),
    ];

    let reasons: Vec<&'static str> = checks
        .iter()
        .filter(|(breached, _)| *breached)
        .map(|(_, reason)| *reason)
        .collect();

    if reasons.is_empty() {
        Status {
            severity: Severity::Normal,
            reasons: vec![REASON_NORMAL],
        }
    } else {
        Status {
            severity: Severity::Warning,
            reasons,
        }
    }
}
