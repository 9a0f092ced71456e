//! Host-level queries and control used by the chat adapter and the API.

use crate::capability::AdminCapability;
use anyhow::{Context, Result};
use log::warn;
use std::process::{Command, Stdio};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Shutdown,
    Restart,
}

impl HostAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::Restart => "restart",
        }
    }

    fn shutdown_args(&self) -> [&'static str; 2] {
        match self {
            Self::Shutdown => ["-h", "now"],
            Self::Restart => ["-r", "now"],
        }
    }
}

/// Fire-and-forget power control. Implementations start the action and
/// return; there is no confirmation and no way to cancel.
pub trait HostControl: Send + Sync {
    fn execute(&self, action: HostAction, authorized: &AdminCapability) -> Result<()>;
}

/// Runs the OS `shutdown` command.
pub struct SystemHostControl;

impl HostControl for SystemHostControl {
    fn execute(&self, action: HostAction, authorized: &AdminCapability) -> Result<()> {
        warn!(
            target: "vitals_audit",
            "HOST {} requested by {}",
            action.as_str(),
            authorized.user()
        );
        Command::new("shutdown")
            .args(action.shutdown_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start host {}", action.as_str()))?;
        Ok(())
    }
}

pub fn uptime_secs(boot_time: u64, now: u64) -> u64 {
    now.saturating_sub(boot_time)
}

/// `"{d}d {h}h {m}m {s}s"`
pub fn format_uptime(secs: u64) -> String {
    format!(
        "{}d {}h {}m {}s",
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60
    )
}

pub fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// How long `ping` callers wait for a connect before giving up.
pub const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Round-trip of a TCP connect to `target`.
pub async fn ping(target: &str, timeout: Duration) -> Result<Duration> {
    let started = Instant::now();
    tokio::time::timeout(timeout, TcpStream::connect(target))
        .await
        .with_context(|| format!("connect to {target} timed out after {timeout:?}"))?
        .with_context(|| format!("connect to {target} failed"))?;
    Ok(started.elapsed())
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn formats_uptime() {
        assert_eq!(format_uptime(0), "0d 0h 0m 0s");
        assert_eq!(format_uptime(90_061), "1d 1h 1m 1s");
        assert_eq!(format_uptime(3_599), "0d 0h 59m 59s");
    }

    #[test]
    fn uptime_never_underflows() {
        assert_eq!(uptime_secs(100, 50), 0);
        assert_eq!(uptime_secs(100, 160), 60);
    }

    #[test]
    fn formats_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn shutdown_arguments() {
        assert_eq!(HostAction::Shutdown.shutdown_args(), ["-h", "now"]);
        assert_eq!(HostAction::Restart.shutdown_args(), ["-r", "now"]);
    }

    #[tokio::test]
    async fn ping_measures_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let latency = ping(&addr, PING_TIMEOUT).await.unwrap();
        assert!(latency < PING_TIMEOUT);
    }

    #[tokio::test]
    async fn ping_reports_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(ping(&addr, Duration::from_secs(2)).await.is_err());
    }
}
