use crate::error::SinkError;
use crate::fanout::Sink;
use crate::types::HealthEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde_json::{Value, json};
use std::time::Duration;

const REPORT_TITLE: &str = "Server Health Report";
const COLOR_RED: u32 = 0xE7_4C_3C;
const COLOR_GREEN: u32 = 0x2E_CC_71;

/// Pushes a formatted health report to a chat incoming-webhook.
pub struct ChatSink {
    client: Client,
    endpoint: Url,
    username: Option<String>,
}

impl ChatSink {
    pub fn new(endpoint: &str, username: Option<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("invalid chat webhook URL")?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            endpoint,
            username,
        })
    }
}

/// Embed payload: Time, CPU/Memory/Disk usage and one status line per
/// warning. Red when anything breached a threshold, green otherwise.
pub fn render_report(event: &HealthEvent, username: Option<&str>) -> Value {
    let snap = &event.snapshot;
    let color = if event.status.is_warning() {
        COLOR_RED
    } else {
        COLOR_GREEN
    };

    let mut payload = json!({
        "embeds": [{
            "title": REPORT_TITLE,
            "color": color,
            "fields": [
                { "name": "Time", "value": snap.timestamp_string(), "inline": false },
                { "name": "CPU Usage", "value": format!("{}%", snap.cpu_percent), "inline": true },
                { "name": "Memory Usage", "value": format!("{}%", snap.memory_percent), "inline": true },
                { "name": "Disk Usage", "value": format!("{}%", snap.disk_percent), "inline": true },
                { "name": "Status", "value": event.status.messages().join("\n"), "inline": false },
            ],
        }],
    });
    if let Some(name) = username {
        payload["username"] = json!(name);
    }
    payload
}

#[async_trait]
impl Sink for ChatSink {
    fn name(&self) -> &str {
        "chat"
    }

    async fn deliver(&self, event: &HealthEvent) -> Result<(), SinkError> {
        let payload = render_report(event, self.username.as_deref());
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SinkError::Status(resp.status()));
        }
        debug!("[chat] report sent for {}", event.snapshot.timestamp_string());
        Ok(())
    }
}
