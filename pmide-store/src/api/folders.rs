//! Folder, item placement and project search endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use pmide_common::events::{ChangeKind, ItemKind};
use serde::{Deserialize, Deserializer, Serialize};

use super::emit_items_changed;
use crate::db::{folders, search};
use crate::models::{Folder, ItemType, SearchResult};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Distinguishes an absent field from an explicit `null`
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct UpdateFolderRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Absent: keep; `null`: move to root; id: move under that folder
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ColorRequest {
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveItemRequest {
    pub item_id: String,
    pub item_type: ItemType,
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub item_id: String,
    pub item_type: ItemType,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

fn item_kind(item_type: ItemType) -> ItemKind {
    match item_type {
        ItemType::Document => ItemKind::Document,
        ItemType::Output => ItemKind::Output,
    }
}

/// GET /api/projects/:id/folders
pub async fn list_folders(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<Folder>>> {
    Ok(Json(folders::list_folders(&state.db, &project_id).await?))
}

/// POST /api/folders
pub async fn create_folder(
    State(state): State<AppState>,
    Json(req): Json<CreateFolderRequest>,
) -> ApiResult<Json<Folder>> {
    let folder = folders::create_folder(
        &state.db,
        &req.project_id,
        &req.name,
        req.parent_id.as_deref(),
        req.color.as_deref(),
    )
    .await?;
    emit_items_changed(&state, &folder.project_id, ItemKind::Folder, &folder.id, ChangeKind::Created);
    Ok(Json(folder))
}

/// GET /api/folders/:id
pub async fn get_folder(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Folder>> {
    folders::get_folder(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Folder {}", id)))
}

/// PUT /api/folders/:id
pub async fn update_folder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFolderRequest>,
) -> ApiResult<Json<Folder>> {
    let parent = req.parent_id.as_ref().map(|p| p.as_deref());
    let folder = folders::update_folder(&state.db, &id, req.name.as_deref(), parent).await?;
    emit_items_changed(&state, &folder.project_id, ItemKind::Folder, &folder.id, ChangeKind::Updated);
    Ok(Json(folder))
}

/// PUT /api/folders/:id/color
pub async fn set_folder_color(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ColorRequest>,
) -> ApiResult<Json<Folder>> {
    let folder = folders::set_folder_color(&state.db, &id, req.color.as_deref()).await?;
    emit_items_changed(&state, &folder.project_id, ItemKind::Folder, &folder.id, ChangeKind::Updated);
    Ok(Json(folder))
}

/// DELETE /api/folders/:id; children and items move to the parent
pub async fn delete_folder(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Folder>> {
    let folder = folders::delete_folder(&state.db, &id).await?;
    emit_items_changed(&state, &folder.project_id, ItemKind::Folder, &id, ChangeKind::Deleted);
    Ok(Json(folder))
}

/// POST /api/items/move
pub async fn move_item(
    State(state): State<AppState>,
    Json(req): Json<MoveItemRequest>,
) -> ApiResult<Json<super::Ack>> {
    let project_id =
        folders::move_item_to_folder(&state.db, &req.item_id, req.item_type, req.folder_id.as_deref()).await?;
    emit_items_changed(&state, &project_id, item_kind(req.item_type), &req.item_id, ChangeKind::Updated);
    Ok(super::Ack::ok())
}

/// POST /api/items/favorite
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Json(req): Json<FavoriteRequest>,
) -> ApiResult<Json<FavoriteResponse>> {
    let (is_favorite, project_id) = folders::toggle_item_favorite(&state.db, &req.item_id, req.item_type).await?;
    emit_items_changed(&state, &project_id, item_kind(req.item_type), &req.item_id, ChangeKind::Updated);
    Ok(Json(FavoriteResponse { is_favorite }))
}

/// GET /api/projects/:id/search?q=
pub async fn search_items(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    Ok(Json(search::search_project_items(&state.db, &project_id, &query.q).await?))
}

pub fn folder_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/folders", get(list_folders))
        .route("/api/projects/:id/search", get(search_items))
        .route("/api/folders", post(create_folder))
        .route("/api/folders/:id", get(get_folder).put(update_folder).delete(delete_folder))
        .route("/api/folders/:id/color", put(set_folder_color))
        .route("/api/items/move", post(move_item))
        .route("/api/items/favorite", post(toggle_favorite))
}
