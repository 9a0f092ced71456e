use crate::error::SinkError;
use crate::fanout::Sink;
use crate::types::HealthEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use std::time::Duration;

/// POSTs every event as JSON to a fixed URL.
pub struct WebhookSink {
    client: Client,
    endpoint: Url,
}

impl WebhookSink {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("invalid webhook URL")?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Sink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, event: &HealthEvent) -> Result<(), SinkError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SinkError::Status(resp.status()));
        }
        debug!("[webhook] delivered snapshot {}", event.snapshot.timestamp_string());
        Ok(())
    }
}
