//! Conversation and message endpoints
//!
//! Streaming chat lives in [`crate::relay`].

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use pmide_common::chat::Role;
use pmide_common::events::{ChangeKind, PmEvent};
use pmide_common::time;
use serde::Deserialize;

use super::Ack;
use crate::db::{conversations, projects};
use crate::models::{Conversation, Message};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    pub tokens: i64,
    pub cost: f64,
}

pub(crate) fn emit_conversation(state: &AppState, conversation: &Conversation, change: ChangeKind) {
    state.event_bus.emit_lossy(PmEvent::ConversationUpdated {
        project_id: conversation.project_id.clone(),
        conversation_id: conversation.id.clone(),
        change,
        timestamp: time::now(),
    });
}

pub(crate) fn emit_message(state: &AppState, message: &Message) {
    state.event_bus.emit_lossy(PmEvent::MessageAdded {
        conversation_id: message.conversation_id.clone(),
        message_id: message.id.clone(),
        role: message.role.clone(),
        timestamp: time::now(),
    });
}

/// GET /api/projects/:id/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<Conversation>>> {
    Ok(Json(conversations::list_conversations(&state.db, &project_id).await?))
}

/// POST /api/projects/:id/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation =
        conversations::create_conversation(&state.db, &project_id, req.title.as_deref(), &req.model).await?;
    projects::touch_project(&state.db, &project_id).await?;
    emit_conversation(&state, &conversation, ChangeKind::Created);
    Ok(Json(conversation))
}

/// GET /api/conversations/:id
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    conversations::get_conversation(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Conversation {}", id)))
}

/// PUT /api/conversations/:id
pub async fn rename_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation = conversations::rename_conversation(&state.db, &id, &req.title).await?;
    emit_conversation(&state, &conversation, ChangeKind::Updated);
    Ok(Json(conversation))
}

/// DELETE /api/conversations/:id
pub async fn delete_conversation(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Ack>> {
    let conversation = conversations::require_conversation(&state.db, &id).await?;
    conversations::delete_conversation(&state.db, &id).await?;
    emit_conversation(&state, &conversation, ChangeKind::Deleted);
    Ok(Ack::ok())
}

/// GET /api/conversations/:id/messages
pub async fn get_messages(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<Message>>> {
    conversations::require_conversation(&state.db, &id).await?;
    Ok(Json(conversations::get_messages(&state.db, &id).await?))
}

/// POST /api/conversations/:id/messages
pub async fn add_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddMessageRequest>,
) -> ApiResult<Json<Message>> {
    let role: Role = req.role.parse()?;
    let message = conversations::add_message(&state.db, &id, role, &req.content, req.tokens).await?;
    emit_message(&state, &message);
    Ok(Json(message))
}

/// POST /api/conversations/:id/stats
pub async fn update_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatsRequest>,
) -> ApiResult<Json<Conversation>> {
    if req.tokens < 0 || req.cost < 0.0 {
        return Err(ApiError::BadRequest("Token and cost deltas cannot be negative".to_string()));
    }
    conversations::update_conversation_stats(&state.db, &id, req.tokens, req.cost).await?;
    let conversation = conversations::require_conversation(&state.db, &id).await?;
    emit_conversation(&state, &conversation, ChangeKind::Updated);
    Ok(Json(conversation))
}

pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:id/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/conversations/:id",
            get(get_conversation).put(rename_conversation).delete(delete_conversation),
        )
        .route("/api/conversations/:id/messages", get(get_messages).post(add_message))
        .route("/api/conversations/:id/stats", post(update_stats))
}
