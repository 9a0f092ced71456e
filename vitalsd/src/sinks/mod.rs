//! Built-in notification sinks.

mod chat;
mod console;
mod stream;
mod webhook;

pub use chat::{ChatSink, render_report};
pub use console::ConsoleSink;
pub use stream::StreamSink;
pub use webhook::WebhookSink;

use crate::config::SinkConfig;
use crate::fanout::Sink;
use std::sync::Arc;
use std::time::Duration;

/// Instantiate the sinks listed under `[[sinks]]`.
pub fn build(configs: &[SinkConfig]) -> anyhow::Result<Vec<Arc<dyn Sink>>> {
    configs
        .iter()
        .map(|cfg| -> anyhow::Result<Arc<dyn Sink>> {
            Ok(match cfg {
                SinkConfig::Webhook { url, timeout_ms } => Arc::new(WebhookSink::new(
                    url,
                    Duration::from_millis(*timeout_ms),
                )?),
                SinkConfig::Chat {
                    url,
                    timeout_ms,
                    username,
                } => Arc::new(ChatSink::new(
                    url,
                    username.clone(),
                    Duration::from_millis(*timeout_ms),
                )?),
                SinkConfig::Console => Arc::new(ConsoleSink),
            })
        })
        .collect()
}
