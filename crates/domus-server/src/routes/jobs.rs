//! Job status routes, served under both `/api/jobs` and `/jobs`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use domus_runtime::{JobView, ScanReport};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/jobs/{job_id}/status", get(job_status))
}

/// GET /jobs/{job_id}/status: unknown ids are 404, blank ids 400.
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobView<ScanReport>>> {
    Ok(Json(state.coordinator.job_status(&job_id)?))
}
