//! Saved prompt endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;

use super::{emit_prompts_changed, Ack};
use crate::db::prompts;
use crate::models::{RenderedPrompt, SavedPrompt, SavedPromptInput};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DuplicateRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub values: HashMap<String, String>,
}

/// GET /api/prompts?category=
pub async fn list_prompts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<SavedPrompt>>> {
    Ok(Json(prompts::list_saved_prompts(&state.db, query.category.as_deref()).await?))
}

/// GET /api/prompts/search?q=
pub async fn search_prompts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SavedPrompt>>> {
    Ok(Json(prompts::search_saved_prompts(&state.db, &query.q).await?))
}

/// POST /api/prompts
pub async fn create_prompt(
    State(state): State<AppState>,
    Json(input): Json<SavedPromptInput>,
) -> ApiResult<Json<SavedPrompt>> {
    let prompt = prompts::create_saved_prompt(&state.db, &input).await?;
    emit_prompts_changed(&state, Some(&prompt.id));
    Ok(Json(prompt))
}

/// GET /api/prompts/:id
pub async fn get_prompt(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SavedPrompt>> {
    prompts::get_saved_prompt(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Prompt {}", id)))
}

/// PUT /api/prompts/:id
pub async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SavedPromptInput>,
) -> ApiResult<Json<SavedPrompt>> {
    let prompt = prompts::update_saved_prompt(&state.db, &id, &input).await?;
    emit_prompts_changed(&state, Some(&id));
    Ok(Json(prompt))
}

/// DELETE /api/prompts/:id
pub async fn delete_prompt(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Ack>> {
    prompts::delete_saved_prompt(&state.db, &id).await?;
    emit_prompts_changed(&state, Some(&id));
    Ok(Ack::ok())
}

/// POST /api/prompts/:id/duplicate
pub async fn duplicate_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DuplicateRequest>>,
) -> ApiResult<Json<SavedPrompt>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let prompt = prompts::duplicate_saved_prompt(&state.db, &id, req.name.as_deref()).await?;
    emit_prompts_changed(&state, Some(&prompt.id));
    Ok(Json(prompt))
}

/// POST /api/prompts/:id/use
pub async fn use_prompt(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SavedPrompt>> {
    let prompt = prompts::increment_prompt_usage(&state.db, &id).await?;
    emit_prompts_changed(&state, Some(&id));
    Ok(Json(prompt))
}

/// POST /api/prompts/:id/render
pub async fn render_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenderRequest>,
) -> ApiResult<Json<RenderedPrompt>> {
    Ok(Json(prompts::render_prompt(&state.db, &id, &req.values).await?))
}

pub fn prompt_routes() -> Router<AppState> {
    Router::new()
        .route("/api/prompts", get(list_prompts).post(create_prompt))
        .route("/api/prompts/search", get(search_prompts))
        .route("/api/prompts/:id", get(get_prompt).put(update_prompt).delete(delete_prompt))
        .route("/api/prompts/:id/duplicate", post(duplicate_prompt))
        .route("/api/prompts/:id/use", post(use_prompt))
        .route("/api/prompts/:id/render", post(render_prompt))
}
