//! LLM provider clients
//!
//! Each vendor sits behind [`ChatProvider`]. Streams are normalized to
//! [`ChatEvent`]s: text deltas followed by one `message_stop` with usage.
//! Cost is added by the HTTP layer, not here.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use pmide_common::chat::{ChatEvent, ChatMessage, TokenUsage};
use pmide_common::config::SidecarConfig;
use pmide_common::pricing::Provider;
use pmide_common::sse_parser::{SseDecoder, SseFrame};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Longest upstream error body kept in messages
const MAX_ERROR_BODY: usize = 500;

/// Provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{provider} API error {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    /// Error event inside an otherwise successful stream
    #[error("{0}")]
    Stream(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One completion request, vendor-neutral
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub system: Option<String>,
}

impl ChatParams {
    fn validate(&self) -> ProviderResult<()> {
        if self.messages.is_empty() {
            return Err(ProviderError::InvalidRequest("At least one message is required".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ProviderError::InvalidRequest("max_tokens must be positive".to_string()));
        }
        Ok(())
    }

    fn system_prompt(&self) -> Option<&str> {
        self.system.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Non-streaming completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub stop_reason: Option<String>,
}

pub type ChatEventStream = BoxStream<'static, ProviderResult<ChatEvent>>;

/// A chat-capable LLM vendor
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn chat(&self, params: &ChatParams) -> ProviderResult<Completion>;

    /// Start a streaming completion
    ///
    /// Connection and status errors surface here; failures after the first
    /// byte arrive as `Err` items and end the stream.
    async fn chat_stream(&self, params: &ChatParams) -> ProviderResult<ChatEventStream>;

    async fn list_models(&self) -> ProviderResult<Vec<String>>;
}

/// Client for `provider` using the configured base URLs
pub fn client_for(
    provider: Provider,
    http: reqwest::Client,
    config: &SidecarConfig,
    api_key: &str,
) -> Box<dyn ChatProvider> {
    match provider {
        Provider::Anthropic => Box::new(AnthropicClient::new(http, &config.anthropic_base_url, api_key)),
        Provider::OpenAi => Box::new(OpenAiClient::new(http, &config.openai_base_url, api_key)),
    }
}

/// Pass 2xx responses through; turn anything else into [`ProviderError::Upstream`]
pub(crate) async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Upstream {
        provider,
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// `error.message` from a JSON error body, else the (truncated) raw body
pub(crate) fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    if let Some(msg) = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(Value::as_str)
    {
        return msg.to_string();
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Decode a response body as SSE frames
pub(crate) fn sse_frames(response: reqwest::Response) -> impl Stream<Item = ProviderResult<SseFrame>> + Send {
    async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ProviderError::from)?;
            for frame in decoder.feed(&chunk) {
                yield frame;
            }
        }
        if let Some(frame) = decoder.finish() {
            yield frame;
        }
    }
}

/// Frame-by-frame translation of a vendor stream
pub(crate) trait StreamTranslator: Send + 'static {
    /// Event to emit for `frame`, if any
    fn on_frame(&mut self, frame: &SseFrame) -> ProviderResult<Option<ChatEvent>>;

    /// Called when the body ends; a complete stream yields its final event
    fn on_end(&mut self) -> ProviderResult<Option<ChatEvent>>;

    fn is_finished(&self) -> bool;
}

/// Drive `translator` over a response body until it finishes
pub(crate) fn translate<T: StreamTranslator>(response: reqwest::Response, mut translator: T) -> ChatEventStream {
    let frames = sse_frames(response);
    let stream = async_stream::try_stream! {
        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            let frame = frame?;
            if let Some(event) = translator.on_frame(&frame)? {
                yield event;
            }
            if translator.is_finished() {
                break;
            }
        }
        if !translator.is_finished() {
            if let Some(event) = translator.on_end()? {
                yield event;
            }
        }
    };
    stream.boxed()
}
