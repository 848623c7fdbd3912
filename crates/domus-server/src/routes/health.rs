//! Liveness, readiness and metrics.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
}

/// GET /health: process is up.
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "worker": state.coordinator.worker_running(),
        "jobs": state.coordinator.jobs().len(),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /ready: 503 when the database cannot be reached.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.gate.store().ping() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            warn!("readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "error": { "code": e.code(), "message": e.to_string() },
                })),
            )
        }
    }
}

/// GET /metrics: Prometheus text.
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics.render(state.config.metrics_dir.as_deref());
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}
