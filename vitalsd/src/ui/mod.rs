//! Embedded dashboard page.
//!
//! Polls `/health` every five seconds and shows the recent history; no
//! build step, the HTML ships inside the binary.
use axum::response::{Html, IntoResponse};

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

pub async fn dashboard_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}
