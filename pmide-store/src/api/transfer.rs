//! Import/export endpoints
//!
//! Exports return the bundle document itself; imports take it as a string
//! field so the UI can pass file contents through unchanged.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::{emit_frameworks_changed, emit_prompts_changed};
use crate::transfer::{self, ConflictStrategy, ImportPreview, ImportResult};
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    /// Ids to export; all items when absent
    #[serde(default)]
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub json: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub json: String,
    pub strategy: ConflictStrategy,
}

fn bundle_response(json: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], json)
}

/// GET /api/frameworks/:id/export
pub async fn export_framework(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(bundle_response(transfer::export_framework(&state.db, &id).await?))
}

/// POST /api/export/frameworks
pub async fn export_frameworks(
    State(state): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<impl IntoResponse> {
    let json = match req.ids {
        Some(ids) => transfer::export_frameworks_batch(&state.db, &ids).await?,
        None => transfer::export_all_frameworks(&state.db).await?,
    };
    Ok(bundle_response(json))
}

/// GET /api/prompts/:id/export
pub async fn export_prompt(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(bundle_response(transfer::export_prompt(&state.db, &id).await?))
}

/// POST /api/export/prompts
pub async fn export_prompts(
    State(state): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<impl IntoResponse> {
    let json = match req.ids {
        Some(ids) => transfer::export_prompts_batch(&state.db, &ids).await?,
        None => transfer::export_all_prompts(&state.db).await?,
    };
    Ok(bundle_response(json))
}

/// POST /api/import/frameworks/preview
pub async fn preview_frameworks(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<ImportPreview>> {
    Ok(Json(transfer::preview_import_frameworks(&state.db, &req.json).await?))
}

/// POST /api/import/frameworks/confirm
pub async fn confirm_frameworks(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Json<ImportResult>> {
    let result = transfer::confirm_import_frameworks(&state.db, &req.json, req.strategy).await?;
    emit_frameworks_changed(&state, None);
    Ok(Json(result))
}

/// POST /api/import/prompts/preview
pub async fn preview_prompts(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<ImportPreview>> {
    Ok(Json(transfer::preview_import_prompts(&state.db, &req.json).await?))
}

/// POST /api/import/prompts/confirm
pub async fn confirm_prompts(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Json<ImportResult>> {
    let result = transfer::confirm_import_prompts(&state.db, &req.json, req.strategy).await?;
    emit_prompts_changed(&state, None);
    Ok(Json(result))
}

pub fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/frameworks/:id/export", get(export_framework))
        .route("/api/prompts/:id/export", get(export_prompt))
        .route("/api/export/frameworks", post(export_frameworks))
        .route("/api/export/prompts", post(export_prompts))
        .route("/api/import/frameworks/preview", post(preview_frameworks))
        .route("/api/import/frameworks/confirm", post(confirm_frameworks))
        .route("/api/import/prompts/preview", post(preview_prompts))
        .route("/api/import/prompts/confirm", post(confirm_prompts))
}
