//! Context document endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use pmide_common::events::{ChangeKind, ItemKind};

use super::{emit_items_changed, Ack};
use crate::db::documents;
use crate::models::{ContextDocument, ContextDocumentUpdate, NewContextDocument};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/projects/:id/documents (includes global documents)
pub async fn list_documents(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<ContextDocument>>> {
    Ok(Json(documents::list_context_documents(&state.db, &project_id).await?))
}

/// POST /api/documents
pub async fn create_document(
    State(state): State<AppState>,
    Json(req): Json<NewContextDocument>,
) -> ApiResult<Json<ContextDocument>> {
    let doc = documents::create_context_document(&state.db, &req).await?;
    emit_items_changed(&state, &doc.project_id, ItemKind::Document, &doc.id, ChangeKind::Created);
    Ok(Json(doc))
}

/// GET /api/documents/:id
pub async fn get_document(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ContextDocument>> {
    documents::get_context_document(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Document {}", id)))
}

/// PUT /api/documents/:id
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ContextDocumentUpdate>,
) -> ApiResult<Json<ContextDocument>> {
    let doc = documents::update_context_document(&state.db, &id, &update).await?;
    emit_items_changed(&state, &doc.project_id, ItemKind::Document, &doc.id, ChangeKind::Updated);
    Ok(Json(doc))
}

/// DELETE /api/documents/:id
pub async fn delete_document(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Ack>> {
    let doc = documents::get_context_document(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {}", id)))?;
    documents::delete_context_document(&state.db, &id).await?;
    emit_items_changed(&state, &doc.project_id, ItemKind::Document, &id, ChangeKind::Deleted);
    Ok(Ack::ok())
}

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/documents", get(list_documents))
        .route("/api/documents", post(create_document))
        .route(
            "/api/documents/:id",
            get(get_document).put(update_document).delete(delete_document),
        )
}
