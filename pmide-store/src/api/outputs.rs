//! Framework output endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use pmide_common::events::{ChangeKind, ItemKind};

use super::{emit_items_changed, Ack};
use crate::db::outputs;
use crate::models::{FrameworkOutput, FrameworkOutputUpdate, NewFrameworkOutput};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/projects/:id/outputs
pub async fn list_outputs(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<FrameworkOutput>>> {
    Ok(Json(outputs::list_framework_outputs(&state.db, &project_id).await?))
}

/// POST /api/outputs
pub async fn create_output(
    State(state): State<AppState>,
    Json(req): Json<NewFrameworkOutput>,
) -> ApiResult<Json<FrameworkOutput>> {
    let output = outputs::create_framework_output(&state.db, &req).await?;
    emit_items_changed(&state, &output.project_id, ItemKind::Output, &output.id, ChangeKind::Created);
    Ok(Json(output))
}

/// GET /api/outputs/:id
pub async fn get_output(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<FrameworkOutput>> {
    outputs::get_framework_output(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Output {}", id)))
}

/// PUT /api/outputs/:id
pub async fn update_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<FrameworkOutputUpdate>,
) -> ApiResult<Json<FrameworkOutput>> {
    let output = outputs::update_framework_output(&state.db, &id, &update).await?;
    emit_items_changed(&state, &output.project_id, ItemKind::Output, &output.id, ChangeKind::Updated);
    Ok(Json(output))
}

/// DELETE /api/outputs/:id
pub async fn delete_output(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Ack>> {
    let output = outputs::get_framework_output(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Output {}", id)))?;
    outputs::delete_framework_output(&state.db, &id).await?;
    emit_items_changed(&state, &output.project_id, ItemKind::Output, &id, ChangeKind::Deleted);
    Ok(Ack::ok())
}

pub fn output_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/outputs", get(list_outputs))
        .route("/api/outputs", post(create_output))
        .route("/api/outputs/:id", get(get_output).put(update_output).delete(delete_output))
}
