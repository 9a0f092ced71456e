//! Delivery of health events to notification sinks.
//!
//! Every sink sees every event, in append order. A sink that fails or hangs
//! past the per-sink timeout is logged and skipped for that event only.

use crate::error::SinkError;
use crate::metrics::Metrics;
use crate::types::HealthEvent;
use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, event: &HealthEvent) -> Result<(), SinkError>;
}

pub struct FanOut {
    sinks: Vec<Arc<dyn Sink>>,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl FanOut {
    pub fn new(metrics: Arc<Metrics>, timeout: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            timeout,
            metrics,
        }
    }

    pub fn register(&mut self, sink: Arc<dyn Sink>) {
        debug!("[fanout] registered sink {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Present `event` to every sink and wait for all of them. Returns how
    /// many sinks accepted it.
    pub async fn deliver(&self, event: &HealthEvent) -> usize {
        let attempts = self.sinks.iter().map(|sink| async move {
            let outcome = match tokio::time::timeout(self.timeout, sink.deliver(event)).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout(self.timeout)),
            };
            (sink.name(), outcome)
        });

        let mut delivered = 0;
        for (name, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.inc_sink_deliveries();
                }
                Err(err) => {
                    self.metrics.inc_sink_failures();
                    warn!("[fanout] sink {name} failed: {err}");
                }
            }
        }
        delivered
    }
}
