//! HTTP route handlers.

pub mod export;
pub mod health;
pub mod jobs;
pub mod matters;
pub mod scan;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use domus_core::Error;

use crate::error::ApiResult;
use crate::state::AppState;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.scan.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .nest("/api", api_routes())
        .merge(jobs::routes())
        .merge(export::routes())
        .merge(health::routes())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(matters::routes())
        .merge(scan::routes())
        .merge(jobs::routes())
}

/// Run a blocking gate call (SQLite, blob I/O, report assembly) on the
/// blocking pool. A panicking task is an internal error.
pub(crate) async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> domus_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {}", e)))?
        .map_err(Into::into)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": { "code": "not_found", "message": "No such route" }
        })),
    )
}
