//! Chat endpoints
//!
//! `POST /chat` returns one completion; `POST /chat/stream` re-streams it as
//! SSE. The stream always opens with the conversation id and always ends
//! with either `message_stop` (usage and cost filled in) or `error`.

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use futures::StreamExt;
use pmide_common::chat::{ChatEvent, ChatMessage, TokenUsage};
use pmide_common::pricing::{calculate_cost, Provider};
use pmide_common::sse::chat_event_sse;
use pmide_common::uuid_utils;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::providers::{client_for, ChatParams, ChatProvider};
use crate::{ApiError, ApiResult, AppState};

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub project_id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub framework_id: Option<String>,
    /// Inferred from the model name when absent
    #[serde(default)]
    pub provider: Option<Provider>,
}

impl ChatRequest {
    fn conversation_id(&self) -> String {
        self.conversation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(uuid_utils::conversation_id)
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub content: String,
    pub usage: TokenUsage,
    pub cost: f64,
    pub model: String,
}

/// Resolve the provider client and vendor-neutral parameters
async fn prepare(state: &AppState, req: &ChatRequest) -> ApiResult<(Box<dyn ChatProvider>, ChatParams)> {
    if req.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest("api_key is required".to_string()));
    }

    let mut system = req.system.clone().filter(|s| !s.trim().is_empty());
    if let Some(framework_id) = req.framework_id.as_deref().filter(|id| !id.is_empty()) {
        let framework = state
            .frameworks
            .get(framework_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Framework {}", framework_id)))?;
        let prompt = framework.full_system_prompt();
        system = Some(match system {
            Some(extra) => format!("{}\n\n{}", prompt, extra),
            None => prompt,
        });
    }

    let provider = req.provider.unwrap_or_else(|| Provider::for_model(&req.model));
    let client = client_for(provider, state.http.clone(), &state.config, &req.api_key);
    let params = ChatParams {
        model: req.model.clone(),
        messages: req.messages.clone(),
        max_tokens: req.max_tokens,
        system,
    };
    Ok((client, params))
}

/// POST /chat
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> ApiResult<Json<ChatResponse>> {
    info!(
        project_id = %req.project_id,
        "Chat request with {} messages",
        req.messages.len()
    );

    let (client, params) = prepare(&state, &req).await?;
    let completion = client.chat(&params).await?;
    let cost = calculate_cost(&completion.model, &completion.usage);

    Ok(Json(ChatResponse {
        conversation_id: req.conversation_id(),
        content: completion.content,
        usage: completion.usage,
        cost,
        model: completion.model,
    }))
}

/// POST /chat/stream
pub async fn chat_stream(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> impl IntoResponse {
    info!(
        project_id = %req.project_id,
        "Stream request with {} messages",
        req.messages.len()
    );
    let conversation_id = req.conversation_id();

    let events = async_stream::stream! {
        yield ChatEvent::ConversationId { conversation_id };

        let (client, params) = match prepare(&state, &req).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Stream request rejected: {}", e);
                yield ChatEvent::error(e.to_string());
                return;
            }
        };

        let mut upstream = match client.chat_stream(&params).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Provider stream failed to start: {}", e);
                yield ChatEvent::error(e.to_string());
                return;
            }
        };

        while let Some(item) = upstream.next().await {
            match item {
                Ok(ChatEvent::MessageStop { usage, cost, stop_reason }) => {
                    let cost = cost.unwrap_or_else(|| calculate_cost(&params.model, &usage));
                    info!(
                        "Stream complete: {} in / {} out tokens, ${:.6}",
                        usage.input_tokens, usage.output_tokens, cost
                    );
                    yield ChatEvent::MessageStop { usage, cost: Some(cost), stop_reason };
                    return;
                }
                Ok(event) => yield event,
                Err(e) => {
                    warn!("Provider stream failed: {}", e);
                    yield ChatEvent::error(e.to_string());
                    return;
                }
            }
        }

        yield ChatEvent::error("Stream ended before completion");
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        chat_event_sse(events),
    )
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
}
