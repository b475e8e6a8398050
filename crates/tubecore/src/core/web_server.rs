//! Health-check web server.
//!
//! Hosting platforms probe `/health` to decide whether the process is alive.
//! `/status` exposes queue counters as JSON.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

use crate::download::queue::JobQueue;

/// Shared state for the web server.
#[derive(Clone)]
struct WebState {
    queue: Arc<JobQueue>,
    started: Instant,
}

/// Routes of the health server.
pub fn router(queue: Arc<JobQueue>) -> Router {
    let state = WebState {
        queue,
        started: Instant::now(),
    };

    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Start the health-check web server.
pub async fn start_web_server(port: u16, queue: Arc<JobQueue>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(queue);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /health  - Health check");
    log::info!("  /status  - Queue status (JSON)");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /: banner for humans.
async fn home_handler() -> impl IntoResponse {
    "YouTube Downloader Bot is running!"
}

/// GET /health: simple health check.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /status: queue counters.
async fn status_handler(State(state): State<WebState>) -> impl IntoResponse {
    let stats = state.queue.stats();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
        "queue": stats,
    }))
}
