//! Framework category and definition endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::{emit_frameworks_changed, Ack};
use crate::db::frameworks;
use crate::models::{CategoryInput, FrameworkCategoryRow, FrameworkDefInput, FrameworkDefRow};
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

/// GET /api/framework-categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<FrameworkCategoryRow>>> {
    Ok(Json(frameworks::list_framework_categories(&state.db).await?))
}

/// POST /api/framework-categories
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Json<FrameworkCategoryRow>> {
    let category = frameworks::create_framework_category(&state.db, &input).await?;
    emit_frameworks_changed(&state, None);
    Ok(Json(category))
}

/// GET /api/framework-categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FrameworkCategoryRow>> {
    frameworks::get_framework_category(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Category {}", id)))
}

/// PUT /api/framework-categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Json<FrameworkCategoryRow>> {
    let category = frameworks::update_framework_category(&state.db, &id, &input).await?;
    emit_frameworks_changed(&state, None);
    Ok(Json(category))
}

/// DELETE /api/framework-categories/:id
pub async fn delete_category(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Ack>> {
    frameworks::delete_framework_category(&state.db, &id).await?;
    emit_frameworks_changed(&state, None);
    Ok(Ack::ok())
}

/// GET /api/frameworks?category=
pub async fn list_defs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<FrameworkDefRow>>> {
    Ok(Json(frameworks::list_framework_defs(&state.db, query.category.as_deref()).await?))
}

/// GET /api/frameworks/search?q=
pub async fn search_defs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<FrameworkDefRow>>> {
    Ok(Json(frameworks::search_framework_defs(&state.db, &query.q).await?))
}

/// POST /api/frameworks
pub async fn create_def(
    State(state): State<AppState>,
    Json(input): Json<FrameworkDefInput>,
) -> ApiResult<Json<FrameworkDefRow>> {
    let def = frameworks::create_framework_def(&state.db, &input).await?;
    info!("Created framework {} ({})", def.name, def.id);
    emit_frameworks_changed(&state, Some(&def.id));
    Ok(Json(def))
}

/// GET /api/frameworks/:id
pub async fn get_def(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<FrameworkDefRow>> {
    frameworks::get_framework_def(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Framework {}", id)))
}

/// PUT /api/frameworks/:id
pub async fn update_def(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<FrameworkDefInput>,
) -> ApiResult<Json<FrameworkDefRow>> {
    let def = frameworks::update_framework_def(&state.db, &id, &input).await?;
    emit_frameworks_changed(&state, Some(&id));
    Ok(Json(def))
}

/// DELETE /api/frameworks/:id
pub async fn delete_def(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Ack>> {
    frameworks::delete_framework_def(&state.db, &id).await?;
    emit_frameworks_changed(&state, Some(&id));
    Ok(Ack::ok())
}

/// POST /api/frameworks/:id/reset
pub async fn reset_def(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<FrameworkDefRow>> {
    let def = frameworks::reset_framework_def(&state.db, &id).await?;
    info!("Reset built-in framework {}", id);
    emit_frameworks_changed(&state, Some(&id));
    Ok(Json(def))
}

/// POST /api/frameworks/:id/duplicate
pub async fn duplicate_def(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DuplicateRequest>>,
) -> ApiResult<Json<FrameworkDefRow>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let def = frameworks::duplicate_framework_def(&state.db, &id, req.name.as_deref()).await?;
    emit_frameworks_changed(&state, Some(&def.id));
    Ok(Json(def))
}

pub fn framework_routes() -> Router<AppState> {
    Router::new()
        .route("/api/framework-categories", get(list_categories).post(create_category))
        .route(
            "/api/framework-categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/api/frameworks", get(list_defs).post(create_def))
        .route("/api/frameworks/search", get(search_defs))
        .route("/api/frameworks/:id", get(get_def).put(update_def).delete(delete_def))
        .route("/api/frameworks/:id/reset", post(reset_def))
        .route("/api/frameworks/:id/duplicate", post(duplicate_def))
}
