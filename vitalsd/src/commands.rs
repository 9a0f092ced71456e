//! On-demand chat commands.
//!
//! The chat bridge forwards a message and the caller's roles; `dispatch`
//! answers with a plain-text reply. Everything here is a read-only query
//! except `!shutdown` and `!restart`, which need an admin capability.

use crate::capability::{Caller, require_admin};
use crate::host::{self, HostAction, HostControl};
use crate::monitor::MonitorContext;
use crate::types::{NetworkSummary, ProcessUsage};
use log::info;
use std::fmt::Write as _;
use std::sync::Arc;

pub const DEFAULT_TOP: usize = 5;
pub const MAX_TOP: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Health,
    Uptime,
    Top(usize),
    Network,
    Ping,
    Shutdown,
    Restart,
    Help,
}

impl ChatCommand {
    /// Parse `!name [arg]`. The leading `!` is optional.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut parts = text.trim().trim_start_matches('!').split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();

        match name.as_str() {
            "health" | "status" => Ok(Self::Health),
            "uptime" => Ok(Self::Uptime),
            "top" => {
                let n = match arg {
                    Some(raw) => raw
                        .parse::<usize>()
                        .map_err(|_| format!("`{raw}` is not a number"))?,
                    None => DEFAULT_TOP,
                };
                Ok(Self::Top(n.clamp(1, MAX_TOP)))
            }
            "network" | "net" => Ok(Self::Network),
            "ping" => Ok(Self::Ping),
            "shutdown" => Ok(Self::Shutdown),
            "restart" | "reboot" => Ok(Self::Restart),
            "help" | "" => Ok(Self::Help),
            other => Err(format!("unknown command `{other}`; try !help")),
        }
    }
}

pub struct CommandContext {
    pub monitor: Arc<MonitorContext>,
    pub host: Arc<dyn HostControl>,
    pub admin_role: String,
    pub ping_target: String,
}

pub async fn dispatch(ctx: &CommandContext, caller: &Caller, command: ChatCommand) -> String {
    info!("[chat] {} ran {:?}", caller.user, command);
    match command {
        ChatCommand::Health => health_reply(ctx),
        ChatCommand::Uptime => uptime_reply(ctx).await,
        ChatCommand::Top(n) => top_reply(ctx, n).await,
        ChatCommand::Network => network_reply(ctx).await,
        ChatCommand::Ping => match host::ping(&ctx.ping_target, host::PING_TIMEOUT).await {
            Ok(latency) => format!("Pong! {} in {} ms", ctx.ping_target, latency.as_millis()),
            Err(err) => format!("Ping failed: {err:#}"),
        },
        ChatCommand::Shutdown => host_action(ctx, caller, HostAction::Shutdown),
        ChatCommand::Restart => host_action(ctx, caller, HostAction::Restart),
        ChatCommand::Help => HELP.to_string(),
    }
}

const HELP: &str = "Commands: !health, !uptime, !top [N], !network, !ping, !shutdown, !restart";

fn health_reply(ctx: &CommandContext) -> String {
    let Some(event) = ctx.monitor.latest_event() else {
        return "No health data available.".to_string();
    };
    let snap = &event.snapshot;
    format!(
        "Server Health Report\nTime: {}\nCPU Usage: {}%\nMemory Usage: {}%\nDisk Usage: {}%\nStatus: {}",
        snap.timestamp_string(),
        snap.cpu_percent,
        snap.memory_percent,
        snap.disk_percent,
        event.status.messages().join(", ")
    )
}

async fn uptime_reply(ctx: &CommandContext) -> String {
    let source = Arc::clone(&ctx.monitor.source);
    match tokio::task::spawn_blocking(move || source.boot_time()).await {
        Ok(Ok(boot)) => format!(
            "Uptime: {}",
            host::format_uptime(host::uptime_secs(boot, host::now_epoch_secs()))
        ),
        Ok(Err(err)) => format!("Uptime unavailable: {err}"),
        Err(err) => format!("Uptime unavailable: {err}"),
    }
}

async fn top_reply(ctx: &CommandContext, n: usize) -> String {
    let source = Arc::clone(&ctx.monitor.source);
    match tokio::task::spawn_blocking(move || source.top_processes(n)).await {
        Ok(Ok(processes)) => format_top(&processes),
        Ok(Err(err)) => format!("Process list unavailable: {err}"),
        Err(err) => format!("Process list unavailable: {err}"),
    }
}

fn format_top(processes: &[ProcessUsage]) -> String {
    let mut out = format!("Top {} processes by CPU:", processes.len());
    for p in processes {
        let _ = write!(
            out,
            "\n{:>7}  {:>5.1}%  {:>10}  {}",
            p.pid,
            p.cpu_percent,
            host::format_bytes(p.memory_bytes),
            p.name
        );
    }
    out
}

async fn network_reply(ctx: &CommandContext) -> String {
    let source = Arc::clone(&ctx.monitor.source);
    match tokio::task::spawn_blocking(move || source.network()).await {
        Ok(Ok(summary)) => format_network(&summary),
        Ok(Err(err)) => format!("Network stats unavailable: {err}"),
        Err(err) => format!("Network stats unavailable: {err}"),
    }
}

fn format_network(summary: &NetworkSummary) -> String {
    let connections = summary
        .connections
        .map(|c| c.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Network I/O\nReceived: {}\nSent: {}\nConnections: {}",
        host::format_bytes(summary.bytes_received),
        host::format_bytes(summary.bytes_sent),
        connections
    )
}

fn host_action(ctx: &CommandContext, caller: &Caller, action: HostAction) -> String {
    let capability = match require_admin(caller, &ctx.admin_role) {
        Ok(cap) => cap,
        Err(denied) => return format!("Permission denied: {denied}"),
    };
    match ctx.host.execute(action, &capability) {
        Ok(()) => format!("Host {} initiated by {}.", action.as_str(), capability.user()),
        Err(err) => format!("Host {} failed: {err:#}", action.as_str()),
    }
}
