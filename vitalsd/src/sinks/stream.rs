use crate::error::SinkError;
use crate::fanout::Sink;
use crate::types::HealthEvent;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Publishes events to live dashboard subscribers (`/events`). Having no
/// subscribers is not a failure.
pub struct StreamSink {
    tx: broadcast::Sender<HealthEvent>,
}

impl StreamSink {
    pub fn new(tx: broadcast::Sender<HealthEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Sink for StreamSink {
    fn name(&self) -> &str {
        "dashboard"
    }

    async fn deliver(&self, event: &HealthEvent) -> Result<(), SinkError> {
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Thresholds, evaluate};
    use crate::types::{Snapshot, local_now};

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let (tx, mut rx) = broadcast::channel(8);
        let sink = StreamSink::new(tx);

        for cpu in [1.0, 2.0] {
            let snapshot = Snapshot::new(local_now(), cpu, 0.0, 0.0);
            let status = evaluate(&snapshot, &Thresholds::default());
            sink.deliver(&HealthEvent { snapshot, status }).await.unwrap();
        }

        assert_eq!(rx.recv().await.unwrap().snapshot.cpu_percent, 1.0);
        assert_eq!(rx.recv().await.unwrap().snapshot.cpu_percent, 2.0);
    }

    #[tokio::test]
    async fn no_subscribers_is_ok() {
        let (tx, rx) = broadcast::channel(1);
        drop(rx);
        let snapshot = Snapshot::new(local_now(), 0.0, 0.0, 0.0);
        let status = evaluate(&snapshot, &Thresholds::default());
        assert!(StreamSink::new(tx).deliver(&HealthEvent { snapshot, status }).await.is_ok());
    }
}
