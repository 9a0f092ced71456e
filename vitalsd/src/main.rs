use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use vitalsd::api::{self, AppState};
use vitalsd::commands::CommandContext;
use vitalsd::config::Config;
use vitalsd::fanout::FanOut;
use vitalsd::history::HistoryStore;
use vitalsd::host::SystemHostControl;
use vitalsd::metrics::Metrics;
use vitalsd::monitor::{self, MonitorContext};
use vitalsd::sampler::Sampler;
use vitalsd::sinks::{self, StreamSink};
use vitalsd::source::{MetricsSource, SysinfoSource};

const EVENT_BUFFER: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "vitalsd", version, about = "Host health monitor daemon")]
struct Args {
    /// Configuration file
    #[arg(long, env = "VITALS_CONFIG")]
    config: Option<PathBuf>,

    /// Take a single sample, record and notify it, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    let metrics = Arc::new(Metrics::new());
    let source: Arc<dyn MetricsSource> = Arc::new(SysinfoSource::new(
        config.monitor.disk_mount.clone(),
        config.monitor.cpu_sample(),
    ));
    let history = Arc::new(HistoryStore::open(
        config.monitor.history_path.clone(),
        config.monitor.max_entries,
    ));

    let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
    let mut fanout = FanOut::new(Arc::clone(&metrics), config.monitor.sink_timeout());
    if !args.once {
        fanout.register(Arc::new(StreamSink::new(events_tx.clone())));
    }
    for sink in sinks::build(&config.sinks).context("failed to set up notification sinks")? {
        fanout.register(sink);
    }

    let ctx = Arc::new(MonitorContext {
        thresholds: config.thresholds,
        history,
        source,
        fanout,
        metrics,
    });

    if args.once {
        return run_once(&ctx).await;
    }

    info!(
        "[vitalsd] sampling every {}s, sinks: {}",
        config.monitor.interval_seconds,
        ctx.fanout.sink_names().join(", ")
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = tokio::spawn(monitor::run(
        Arc::clone(&ctx),
        config.monitor.interval(),
        shutdown_rx.clone(),
    ));

    let commands = Arc::new(CommandContext {
        monitor: Arc::clone(&ctx),
        host: Arc::new(SystemHostControl),
        admin_role: config.chat.admin_role.clone(),
        ping_target: config.chat.ping_target.clone(),
    });
    let state = Arc::new(AppState {
        monitor: Arc::clone(&ctx),
        commands,
        events: events_tx,
        interval_seconds: config.monitor.interval_seconds,
        shutdown: shutdown_rx,
    });

    let listener = tokio::net::TcpListener::bind(&config.api.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.api.listen_addr))?;
    info!("[api] listening on http://{}", config.api.listen_addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("HTTP server failed")?;

    if let Err(err) = monitor_task.await {
        warn!("[vitalsd] monitor task ended abnormally: {err}");
    }
    info!("[vitalsd] shutdown complete");
    Ok(())
}

/// One tick, like a cron job would run it.
async fn run_once(ctx: &MonitorContext) -> Result<()> {
    let mut sampler = Sampler::new(Arc::clone(&ctx.source), Arc::clone(&ctx.metrics))
        .resume_after(ctx.history.latest().map(|s| s.timestamp));
    let Some(snapshot) = sampler.tick().await else {
        bail!("could not collect system metrics");
    };
    let timestamp = snapshot.timestamp_string();
    ctx.record(snapshot)
        .await
        .context("failed to record health snapshot")?;
    println!("Logged system health at {timestamp}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("[vitalsd] cannot listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!("[vitalsd] cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("[vitalsd] received SIGINT, shutting down"),
        () = terminate => info!("[vitalsd] received SIGTERM, shutting down"),
    }
}
