use crate::error::SinkError;
use crate::fanout::Sink;
use crate::types::HealthEvent;
use async_trait::async_trait;
use log::{info, warn};

/// Writes a one-line summary of each event to the log.
pub struct ConsoleSink;

pub(crate) fn summary(event: &HealthEvent) -> String {
    let snap = &event.snapshot;
    format!(
        "{} cpu={:.1}% mem={:.1}% disk={:.1}% status={}",
        snap.timestamp_string(),
        snap.cpu_percent,
        snap.memory_percent,
        snap.disk_percent,
        event.status.reasons.join(",")
    )
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, event: &HealthEvent) -> Result<(), SinkError> {
        if event.status.is_warning() {
            warn!("[health] {}", summary(event));
        } else {
            info!("[health] {}", summary(event));
        }
        Ok(())
    }
}
