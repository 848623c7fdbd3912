//! Matter routes: create, list, detail, property, upload, approve.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use domus_core::Error;
use domus_runtime::gate::PDF_REQUIRED;
use domus_runtime::Upload;
use domus_store::PropertyUpdate;

use super::run_blocking;
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/matters", get(list_matters).post(create_matter))
        .route("/matters/{id}", get(get_matter))
        .route("/matters/{id}/property", post(update_property))
        .route("/matters/{id}/upload", post(upload_document))
        .route("/matters/{id}/approve", post(approve_matter))
}

#[derive(Debug, Default, Deserialize)]
struct CreateMatterRequest {
    #[serde(default, rename = "ref", alias = "reference")]
    reference: Option<String>,
    #[serde(default)]
    council: Option<String>,
}

/// POST /api/matters: create a matter and return it.
///
/// The body is optional; an empty body or `{}` creates a matter with a
/// generated ref.
async fn create_matter(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: CreateMatterRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateMatterRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::Validation(format!("invalid matter body: {}", e)))?
    };

    let matter = state
        .gate
        .ingest(request.reference.as_deref(), request.council.as_deref())?;

    Ok((StatusCode::CREATED, Json(json!({ "matter": matter }))))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

/// GET /api/matters: newest first.
async fn list_matters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);
    let matters = state.gate.list_matters(limit)?;
    let total = state.gate.store().count_matters()?;

    Ok(Json(json!({
        "matters": matters,
        "total": total,
    })))
}

/// GET /api/matters/{id}: matter with documents and current findings.
async fn get_matter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let detail = state.gate.matter_detail(id)?;

    Ok(Json(json!({
        "matter": detail.matter,
        "documents": detail.documents,
        "findings": detail.findings,
        "risk_score": detail.risk_score,
        "risk_band": detail.risk_band.as_str(),
    })))
}

/// POST /api/matters/{id}/property
async fn update_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let update: PropertyUpdate = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("invalid property body: {}", e)))?;
    let matter = state.gate.update_property(id, &update)?;
    Ok(Json(json!({ "matter": matter })))
}

/// POST /api/matters/{id}/approve
async fn approve_matter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let matter = state.gate.approve(id)?;
    Ok(Json(json!({ "matter": matter })))
}

#[derive(Debug, Deserialize)]
struct KindQuery {
    kind: Option<String>,
}

/// POST /api/matters/{id}/upload?kind=: attach a PDF without scanning it.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<KindQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let multipart = multipart.map_err(|_| Error::Validation(PDF_REQUIRED.into()))?;
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

    Ok((StatusCode::CREATED, Json(json!({ "document": document }))))
}

/// The file part of a multipart upload, plus an optional `kind` form field.
pub(crate) struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub kind: Option<String>,
    pub bytes: Bytes,
}

/// Read the first file part. Missing or malformed parts are "PDF required";
/// a part over the body limit is a payload error.
pub(crate) async fn read_pdf_field(mut multipart: Multipart) -> ApiResult<UploadedFile> {
    let mut file: Option<UploadedFile> = None;
    let mut kind: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e).into()),
        };

        if field.name() == Some("kind") && field.file_name().is_none() {
            let text = field.text().await.map_err(multipart_error)?;
            kind = Some(text.trim().to_string()).filter(|k| !k.is_empty());
            continue;
        }

        if file.is_some() {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload.pdf".to_string());
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        file = Some(UploadedFile {
            filename,
            content_type,
            kind: None,
            bytes,
        });
    }

    let mut file = file.ok_or_else(|| Error::Validation(PDF_REQUIRED.into()))?;
    if !domus_extract::is_pdf(&file.bytes) {
        return Err(Error::Validation(PDF_REQUIRED.into()).into());
    }
    file.kind = kind;
    Ok(file)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(e.body_text())
    } else {
        Error::Validation(PDF_REQUIRED.into())
    }
}
