//! Risk-scan routes.
//!
//! `/risk-scan` takes a multipart PDF and nothing else. `/risk-scan-json`
//! scans a document that was already uploaded. Both accept `mode=sync`
//! (default, 200 with the report) or `mode=async` (202 with a job id).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use domus_core::Error;
use domus_runtime::gate::PDF_REQUIRED;
use domus_runtime::{ScanDispatch, ScanMode, ScanTarget, Upload};

use super::matters::read_pdf_field;
use super::run_blocking;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/matters/{id}/risk-scan", post(risk_scan))
        .route("/matters/{id}/risk-scan-json", post(risk_scan_json))
}

#[derive(Debug, Deserialize)]
struct ScanQuery {
    mode: Option<String>,
    kind: Option<String>,
}

/// POST /api/matters/{id}/risk-scan: multipart PDF upload, then scan.
async fn risk_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ScanQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mode = ScanMode::parse(query.mode.as_deref())?;
    let multipart = multipart.map_err(|rejection| {
        debug!(matter_id = id, "risk-scan rejected: {}", rejection.body_text());
        Error::Validation(PDF_REQUIRED.into())
    })?;
    let file = read_pdf_field(multipart).await?;
    let kind = file.kind.or(query.kind).unwrap_or_default();

    let gate = state.gate.clone();
    let document = run_blocking(move || {
        gate.attach_document(
            id,
            Upload {
                filename: &file.filename,
                content_type: file.content_type.as_deref(),
                kind: &kind,
                bytes: &file.bytes,
            },
        )
    })
    .await?;

    let dispatch = state
        .coordinator
        .scan(id, ScanTarget::Document(document.id), mode)
        .await?;
    Ok(dispatch_response(dispatch))
}

#[derive(Debug, Default, Deserialize)]
struct ScanJsonRequest {
    #[serde(default, alias = "document_id")]
    doc_id: Option<i64>,
    #[serde(default)]
    mode: Option<String>,
}

/// POST /api/matters/{id}/risk-scan-json: `{doc_id?, mode?}`; without a
/// `doc_id` the latest document is scanned.
async fn risk_scan_json(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ScanQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    let request: ScanJsonRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ScanJsonRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::Validation(format!("invalid scan body: {}", e)))?
    };

    let mode = ScanMode::parse(request.mode.as_deref().or(query.mode.as_deref()))?;
    let target = request
        .doc_id
        .map(ScanTarget::Document)
        .unwrap_or(ScanTarget::Latest);

    let dispatch = state.coordinator.scan(id, target, mode).await?;
    Ok(dispatch_response(dispatch))
}

fn dispatch_response(dispatch: ScanDispatch) -> Response {
    match dispatch {
        ScanDispatch::Completed(report) => (StatusCode::OK, Json(report)).into_response(),
        ScanDispatch::Queued(handle) => (StatusCode::ACCEPTED, Json(handle)).into_response(),
    }
}
