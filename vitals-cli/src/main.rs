use clap::{Parser, Subcommand};
use colored::*;
use reqwest::Client;
use std::error::Error;

mod doctor;
mod model;
mod top;
mod watch;

use model::{DaemonStatus, HealthEvent, LiveHealth, Snapshot, Status};

#[derive(clap::Parser, Debug)]
#[command(name = "vitals-cli", version, about = "Query a running vitalsd")]
struct Args {
    /// Base URL of the vitalsd API
    #[clap(long, env = "VITALS_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Disable colorized output
    #[clap(long)]
    no_color: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Show daemon status and counters
    Status,
    /// Take a live sample now
    Health,
    /// Print recorded snapshots, oldest first
    History {
        /// Only the newest N entries
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Busiest processes by CPU
    Top {
        #[clap(default_value_t = 5)]
        n: usize,
    },
    /// Follow recorded snapshots as they happen
    Watch,
    /// Check daemon health and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    let client = Client::new();
    let url = args.url.trim_end_matches('/');

    match args.command {
        Command::Status => {
            let status: DaemonStatus = client
                .get(format!("{url}/status"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            print_status(&status);
        }
        Command::Health => {
            let live: LiveHealth = client
                .get(format!("{url}/health"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", render(&live.snapshot, &live.status));
            println!("Uptime: {}", live.uptime);
        }
        Command::History { limit } => {
            let mut req = client.get(format!("{url}/history"));
            if let Some(limit) = limit {
                req = req.query(&[("limit", limit)]);
            }
            let events: Vec<HealthEvent> = req.send().await?.error_for_status()?.json().await?;
            if events.is_empty() {
                println!("No health data available.");
            }
            for event in events {
                println!("{}", render(&event.snapshot, &event.status));
            }
        }
        Command::Top { n } => top::run_top(&client, url, n).await?,
        Command::Watch => {
            watch::run_watch(&client, url, |ev| render(&ev.snapshot, &ev.status)).await?
        }
        Command::Doctor => doctor::run_doctor(&client, url).await?,
    }
    Ok(())
}

fn render(snap: &Snapshot, status: &Status) -> String {
    let verdict = status.describe();
    let verdict = if status.is_warning() {
        verdict.red().bold()
    } else {
        verdict.green()
    };
    format!(
        "{}  cpu {:>5.1}%  mem {:>5.1}%  disk {:>5.1}%  {}",
        snap.timestamp, snap.cpu_percent, snap.memory_percent, snap.disk_percent, verdict
    )
}

fn print_status(status: &DaemonStatus) {
    let c = &status.counters;
    println!("vitalsd v{} (up {}s)", status.version, status.uptime_s);
    println!(
        "{:<10} {:<10} {:<9} {:<12} {:<14} {:<10} {}",
        "interval", "history", "ticks", "recorded", "collect_errs", "store_errs", "sinks"
    );
    println!(
        "{:<10} {:<10} {:<9} {:<12} {:<14} {:<10} {}",
        format!("{}s", status.interval_seconds),
        format!("{}/{}", status.history_len, status.max_entries),
        c.ticks,
        c.snapshots_recorded,
        c.collection_errors,
        c.storage_errors,
        format!(
            "{} ({} ok, {} failed)",
            status.sinks.join(","),
            c.sink_deliveries,
            c.sink_failures
        )
    );
}
