//! HTTP surface: dashboard, history queries, host queries, live event stream
//! and the chat bridge entry point.

use crate::capability::Caller;
use crate::commands::{self, ChatCommand, CommandContext, DEFAULT_TOP, MAX_TOP};
use crate::host;
use crate::monitor::MonitorContext;
use crate::types::{HealthEvent, Snapshot, local_now};
use crate::ui;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{Stream, StreamExt};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;


pub struct AppState {
    pub monitor: Arc<MonitorContext>,
    pub commands: Arc<CommandContext>,
    pub events: broadcast::Sender<HealthEvent>,
    pub interval_seconds: u64,
    /// Flipped to `true` on shutdown so long-lived SSE streams end.
    pub shutdown: watch::Receiver<bool>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// A host query the platform or source could not answer right now.
    Unavailable(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            Self::BadGateway(m) => (StatusCode::BAD_GATEWAY, m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ui::dashboard_handler))
        .route("/dashboard", get(ui::dashboard_handler))
        .route("/healthz", get(healthz))
        .route("/health", get(health))
        .route("/history", get(history))
        .route("/history/latest", get(history_latest))
        .route("/status", get(status))
        .route("/uptime", get(uptime))
        .route("/processes/top", get(top_processes))
        .route("/network", get(network))
        .route("/ping", get(ping))
        .route("/events", get(events))
        .route("/chat/command", post(chat_command))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Live sample, independent of the recorded history.
async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let source = Arc::clone(&state.monitor.source);
    let reading = blocking(move || source.sample_now())
        .await?
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;

    let snapshot = Snapshot::from_reading(local_now(), &reading);
    let uptime = host::uptime_secs(reading.boot_time, host::now_epoch_secs());
    let event = state.monitor.event_for(snapshot);
    Ok(Json(json!({
        "snapshot": event.snapshot,
        "status": event.status,
        "boot_time": reading.boot_time,
        "uptime": host::format_uptime(uptime),
    })))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<HealthEvent>>> {
    let Query(q) = query.map_err(bad_query)?;
    let snapshots = match q.limit {
        Some(limit) => state.monitor.history.recent(limit),
        None => state.monitor.history.all(),
    };
    Ok(Json(
        snapshots
            .into_iter()
            .map(|s| state.monitor.event_for(s))
            .collect(),
    ))
}

async fn history_latest(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.monitor.latest_event() {
        Some(event) => Json(json!({ "snapshot": event.snapshot, "status": event.status })),
        None => Json(json!({ "snapshot": null, "message": "no health data available" })),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let monitor = &state.monitor;
    let counters = monitor.metrics.snapshot();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_s": counters.uptime_s,
        "interval_seconds": state.interval_seconds,
        "history_len": monitor.history.len(),
        "max_entries": monitor.history.capacity(),
        "history_path": monitor.history.path().display().to_string(),
        "thresholds": monitor.thresholds,
        "sinks": monitor.fanout.sink_names(),
        "counters": counters,
    }))
}

async fn uptime(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let source = Arc::clone(&state.monitor.source);
    let boot = blocking(move || source.boot_time())
        .await?
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;
    let secs = host::uptime_secs(boot, host::now_epoch_secs());
    Ok(Json(json!({
        "boot_time": boot,
        "uptime_s": secs,
        "uptime": host::format_uptime(secs),
    })))
}

#[derive(Debug, Deserialize)]
struct TopQuery {
    n: Option<usize>,
}

async fn top_processes(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TopQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(q) = query.map_err(bad_query)?;
    let n = q.n.unwrap_or(DEFAULT_TOP).clamp(1, MAX_TOP);
    let source = Arc::clone(&state.monitor.source);
    let processes = blocking(move || source.top_processes(n))
        .await?
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;
    Ok(Json(json!({ "processes": processes })))
}

async fn network(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let source = Arc::clone(&state.monitor.source);
    let summary = blocking(move || source.network())
        .await?
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;
    Ok(Json(json!(summary)))
}

async fn ping(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let target = &state.commands.ping_target;
    let latency = host::ping(target, host::PING_TIMEOUT)
        .await
        .map_err(|err| ApiError::BadGateway(format!("{err:#}")))?;
    Ok(Json(json!({
        "target": target,
        "latency_ms": latency.as_secs_f64() * 1000.0,
    })))
}

async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut shutdown = state.shutdown.clone();
    let stream = BroadcastStream::new(state.events.subscribe())
        .filter_map(|msg| async move {
            match msg {
                Ok(event) => match Event::default().event("health").json_data(&event) {
                    Ok(sse) => Some(Ok(sse)),
                    Err(err) => {
                        warn!("[api] failed to encode event: {err}");
                        None
                    }
                },
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!("[api] event subscriber lagged, {n} events dropped");
                    None
                }
            }
        })
        .take_until(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(flatten)]
    caller: Caller,
    text: String,
}

async fn chat_command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Json<Value> {
    debug!("[api] chat command from {}: {}", req.caller.user, req.text);
    let reply = match ChatCommand::parse(&req.text) {
        Ok(command) => commands::dispatch(&state.commands, &req.caller, command).await,
        Err(message) => message,
    };
    Json(json!({ "reply": reply }))
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    debug!("[api] rejected query: {rejection}");
    ApiError::BadRequest(rejection.body_text())
}

async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(format!("worker task failed: {err}")))
}
