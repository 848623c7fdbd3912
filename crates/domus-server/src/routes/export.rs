//! Matter exports under `/la/matters`.
//!
//! Query form (`?mid=`) and path form (`/{mid}/...`) are equivalent. GET
//! exports stored findings; POST additionally accepts `{findings?, risks?}`
//! used only when the matter has no stored findings.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use domus_core::Error;
use domus_runtime::export::{build_docx, build_json, DOCX_CONTENT_TYPE};
use domus_runtime::ExportOverrides;

use super::run_blocking;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/la/matters/export.json", get(json_by_query).post(json_by_query))
        .route("/la/matters/report.docx", get(docx_by_query).post(docx_by_query))
        .route("/la/matters/{mid}/export.json", get(json_by_path).post(json_by_path))
        .route("/la/matters/{mid}/report.docx", get(docx_by_path).post(docx_by_path))
}

#[derive(Debug, Deserialize)]
struct MidQuery {
    mid: Option<String>,
}

fn parse_mid(raw: Option<&str>) -> ApiResult<i64> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(Error::Validation("mid is required".into()).into());
    }
    raw.parse::<i64>()
        .map_err(|_| Error::Validation(format!("mid must be an integer, got {:?}", raw)).into())
}

fn parse_overrides(body: &[u8]) -> ApiResult<ExportOverrides> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExportOverrides::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("invalid export body: {}", e)).into())
}

async fn json_by_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MidQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    export_json(&state, parse_mid(query.mid.as_deref())?, &body).await
}

async fn json_by_path(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    export_json(&state, parse_mid(Some(&mid))?, &body).await
}

async fn docx_by_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MidQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    export_docx(&state, parse_mid(query.mid.as_deref())?, &body).await
}

async fn docx_by_path(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    export_docx(&state, parse_mid(Some(&mid))?, &body).await
}

async fn export_json(state: &AppState, mid: i64, body: &[u8]) -> ApiResult<Response> {
    let overrides = parse_overrides(body)?;
    let gate = state.gate.clone();
    let json = run_blocking(move || gate.build_export(mid, overrides).map(|data| build_json(&data)))
        .await?;
    Ok(Json(json).into_response())
}

async fn export_docx(state: &AppState, mid: i64, body: &[u8]) -> ApiResult<Response> {
    let overrides = parse_overrides(body)?;
    let gate = state.gate.clone();
    let (data, bytes) = run_blocking(move || {
        let data = gate.build_export(mid, overrides)?;
        let bytes = build_docx(&data)?;
        Ok((data, bytes))
    })
    .await?;
    let disposition = format!(
        "attachment; filename=\"{}.docx\"",
        report_stem(&data.matter.reference)
    );

    Ok((
        [
            (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Refs contain '/', which cannot appear in a download filename.
fn report_stem(reference: &str) -> String {
    reference
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
