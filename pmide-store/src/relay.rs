//! Streaming chat relay
//!
//! `POST /api/conversations/:id/chat` stores the user message, forwards the
//! conversation to the sidecar's `/chat/stream`, and re-emits the decoded
//! events to the caller as SSE. A background task owns the upstream stream
//! so the assistant reply is saved even if the caller disconnects early.

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::post,
    Json, Router,
};
use futures::stream::Stream;
use futures::StreamExt;
use pmide_common::chat::{AccumulatorStep, ChatAccumulator, ChatEvent, ChatMessage, ChatOutcome, Role};
use pmide_common::events::{ChangeKind, PmEvent};
use pmide_common::frameworks::FrameworkDefinition;
use pmide_common::pricing::{self, Provider};
use pmide_common::sse::chat_event_sse;
use pmide_common::sse_parser::{SseDecoder, SseFrame};
use pmide_common::time;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::conversations::{emit_conversation, emit_message};
use crate::db::{conversations, frameworks, projects, settings, usage};
use crate::models::{Conversation, FrameworkDefRow};
use crate::{ApiError, ApiResult, AppState};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub framework_id: Option<String>,
}

/// Body of the sidecar's `/chat/stream`
#[derive(Debug, Serialize)]
struct SidecarChatRequest<'a> {
    project_id: &'a str,
    conversation_id: &'a str,
    messages: Vec<ChatMessage>,
    api_key: String,
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    provider: Provider,
}

fn framework_prompt(row: &FrameworkDefRow) -> String {
    FrameworkDefinition {
        id: row.id.clone(),
        category: row.category.clone(),
        name: row.name.clone(),
        description: row.description.clone(),
        icon: row.icon.clone(),
        system_prompt: row.system_prompt.clone(),
        guiding_questions: row.guiding_questions.clone(),
        example_output: row.example_output.clone(),
        supports_visuals: row.supports_visuals,
        visual_instructions: row.visual_instructions.clone(),
    }
    .full_system_prompt()
}

/// Framework prompt (from the local, possibly edited, definition) followed by
/// the caller's system prompt
async fn compose_system(
    pool: &SqlitePool,
    framework_id: Option<&str>,
    system: Option<&str>,
) -> ApiResult<Option<String>> {
    let system = system.map(str::trim).filter(|s| !s.is_empty());
    let framework = match framework_id {
        Some(id) => Some(frameworks::require_framework_def(pool, id).await?),
        None => None,
    };

    Ok(match (framework, system) {
        (Some(def), Some(system)) => Some(format!("{}\n\n{}", framework_prompt(&def), system)),
        (Some(def), None) => Some(framework_prompt(&def)),
        (None, Some(system)) => Some(system.to_string()),
        (None, None) => None,
    })
}

/// POST /api/conversations/:id/chat
pub async fn chat(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let conversation = conversations::require_conversation(&state.db, &conversation_id).await?;
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Message content cannot be empty".to_string()));
    }

    let api_key = settings::get_decrypted_api_key(&state.db, &state.secrets)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No API key configured".to_string()))?;
    let current = settings::get_settings(&state.db, &state.secrets).await?;
    let model = req.model.clone().unwrap_or_else(|| conversation.model.clone());
    let max_tokens = req.max_tokens.unwrap_or(current.max_tokens.clamp(1, u32::MAX as i64) as u32);
    let system = compose_system(&state.db, req.framework_id.as_deref(), req.system.as_deref()).await?;

    let user_message = conversations::add_message(
        &state.db,
        &conversation.id,
        Role::User,
        content,
        Some(pricing::estimate_tokens(content) as i64),
    )
    .await?;
    emit_message(&state, &user_message);

    let history: Vec<ChatMessage> = conversations::get_messages(&state.db, &conversation.id)
        .await?
        .into_iter()
        .filter_map(|m| match m.role.parse::<Role>() {
            Ok(role @ (Role::User | Role::Assistant)) => Some(ChatMessage { role, content: m.content }),
            _ => None,
        })
        .collect();

    let body = SidecarChatRequest {
        project_id: &conversation.project_id,
        conversation_id: &conversation.id,
        messages: history,
        api_key,
        model: &model,
        max_tokens,
        system,
        provider: Provider::for_model(&model),
    };

    let url = format!("{}/chat/stream", settings::sidecar_url(&state.db).await?);
    info!("Relaying chat for conversation {} to {} ({})", conversation.id, url, model);

    let response = state
        .http
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Sidecar unreachable: {}", e)))?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ApiError::Upstream(format!("Sidecar returned {}: {}", status, text)));
    }

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(pump(state.clone(), conversation, model, response, tx));

    let events = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };
    Ok(chat_event_sse(events))
}

/// Forward to the caller; a closed channel only means the caller left
async fn forward(tx: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    if tx.send(event).await.is_err() {
        debug!("Chat client disconnected; continuing to drain upstream");
    }
}

enum Flow {
    Continue,
    Done,
}

async fn relay_frame(
    frame: &SseFrame,
    acc: &mut ChatAccumulator,
    tx: &mpsc::Sender<ChatEvent>,
) -> Flow {
    let event = match ChatEvent::from_frame(frame) {
        Ok(Some(event)) => event,
        Ok(None) => return Flow::Continue,
        Err(e) => {
            warn!("Dropping chat stream: {}", e);
            let event = ChatEvent::error(e.to_string());
            // Mark the accumulator failed so nothing is persisted
            let _ = acc.apply(event.clone());
            forward(tx, event).await;
            return Flow::Done;
        }
    };

    match acc.apply(event.clone()) {
        Ok(AccumulatorStep::Continue) => {
            forward(tx, event).await;
            Flow::Continue
        }
        // The stop event is forwarded after the reply is saved
        Ok(AccumulatorStep::Completed) => Flow::Done,
        Ok(AccumulatorStep::Failed) => {
            forward(tx, event).await;
            Flow::Done
        }
        Err(e) => {
            warn!("Ignoring chat event: {}", e);
            Flow::Done
        }
    }
}

async fn pump(
    state: AppState,
    conversation: Conversation,
    model: String,
    response: reqwest::Response,
    tx: mpsc::Sender<ChatEvent>,
) {
    let mut acc = ChatAccumulator::new(model);
    let mut decoder = SseDecoder::new();
    let mut upstream = response.bytes_stream();
    let mut done = false;

    while let Some(chunk) = upstream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Sidecar stream failed: {}", e);
                break;
            }
        };
        for frame in decoder.feed(&chunk) {
            if let Flow::Done = relay_frame(&frame, &mut acc, &tx).await {
                done = true;
                break;
            }
        }
        if done {
            break;
        }
    }
    if !done {
        if let Some(frame) = decoder.finish() {
            relay_frame(&frame, &mut acc, &tx).await;
        }
    }

    let already_reported = acc.error().is_some();
    match acc.into_outcome() {
        Ok(outcome) => {
            let stop = ChatEvent::MessageStop {
                usage: outcome.usage,
                cost: Some(outcome.cost),
                stop_reason: outcome.stop_reason.clone(),
            };
            match persist_reply(&state, &conversation, outcome).await {
                Ok(()) => forward(&tx, stop).await,
                Err(e) => {
                    error!("Failed to save assistant reply for {}: {}", conversation.id, e);
                    forward(&tx, ChatEvent::error(format!("Failed to save response: {}", e))).await;
                }
            }
        }
        Err(e) => {
            if !already_reported {
                forward(&tx, ChatEvent::error(e.to_string())).await;
            }
            warn!("Chat for conversation {} ended without a reply: {}", conversation.id, e);
        }
    }
}

/// Save the assistant message, its usage and the running totals
async fn persist_reply(
    state: &AppState,
    conversation: &Conversation,
    outcome: ChatOutcome,
) -> pmide_common::Result<()> {
    let input_tokens = outcome.usage.input_tokens as i64;
    let output_tokens = outcome.usage.output_tokens as i64;

    let message = conversations::add_message(
        &state.db,
        &conversation.id,
        Role::Assistant,
        &outcome.content,
        Some(output_tokens),
    )
    .await?;
    emit_message(state, &message);

    let record = usage::record_token_usage(
        &state.db,
        Some(&conversation.id),
        &outcome.model,
        input_tokens,
        output_tokens,
        outcome.cost,
    )
    .await?;
    state.event_bus.emit_lossy(PmEvent::TokenUsageRecorded {
        conversation_id: record.conversation_id,
        model: record.model,
        input_tokens,
        output_tokens,
        cost: record.cost,
        timestamp: time::now(),
    });

    conversations::update_conversation_stats(&state.db, &conversation.id, input_tokens + output_tokens, outcome.cost)
        .await?;
    projects::touch_project(&state.db, &conversation.project_id).await?;
    let updated = conversations::require_conversation(&state.db, &conversation.id).await?;
    emit_conversation(state, &updated, ChangeKind::Updated);

    info!(
        "Saved reply for {}: {} in / {} out tokens, ${:.6}",
        conversation.id, input_tokens, output_tokens, outcome.cost
    );
    Ok(())
}

pub fn relay_routes() -> Router<AppState> {
    Router::new().route("/api/conversations/:id/chat", post(chat))
}
