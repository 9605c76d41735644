//! OpenAI Chat Completions client

use async_trait::async_trait;
use pmide_common::chat::{ChatEvent, ChatMessage, TokenUsage};
use pmide_common::pricing::{estimate_prompt_tokens, estimate_tokens, Provider};
use pmide_common::sse_parser::SseFrame;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{
    ensure_success, translate, ChatEventStream, ChatParams, ChatProvider, Completion, ProviderError,
    ProviderResult, StreamTranslator,
};

const PROVIDER: &str = "OpenAI";

/// Chat models surfaced in the picker, in display order
const PRIORITY_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4-turbo-preview",
    "gpt-4",
    "gpt-3.5-turbo",
];

/// Returned when the key's model listing cannot be fetched
pub const DEFAULT_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"];

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn body(&self, params: &ChatParams, stream: bool) -> Value {
        let mut messages = Vec::with_capacity(params.messages.len() + 1);
        if let Some(system) = params.system_prompt() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(
            params
                .messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
        );

        let mut body = json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "messages": messages,
        });
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    async fn send(&self, body: &Value) -> ProviderResult<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        ensure_success(PROVIDER, response).await
    }

    async fn fetch_model_ids(&self) -> ProviderResult<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let list: ModelList = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("OpenAI model list: {}", e)))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn chat(&self, params: &ChatParams) -> ProviderResult<Completion> {
        params.validate()?;
        info!("Calling OpenAI with model {} ({} messages)", params.model, params.messages.len());

        let response = self.send(&self.body(params, false)).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("OpenAI response: {}", e)))?;

        let choice = parsed.choices.into_iter().next();
        let content = choice
            .as_ref()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = choice.and_then(|c| c.finish_reason);
        let usage = match parsed.usage {
            Some(u) => TokenUsage::new(u.prompt_tokens, u.completion_tokens),
            None => TokenUsage::new(
                estimate_prompt_tokens(&params.messages, params.system_prompt()),
                estimate_tokens(&content),
            ),
        };

        Ok(Completion {
            content,
            usage,
            model: parsed.model,
            stop_reason,
        })
    }

    async fn chat_stream(&self, params: &ChatParams) -> ProviderResult<ChatEventStream> {
        params.validate()?;
        info!("Streaming from OpenAI with model {} ({} messages)", params.model, params.messages.len());

        let response = self.send(&self.body(params, true)).await?;
        let state = OpenAiStream::new(&params.messages, params.system_prompt());
        Ok(translate(response, state))
    }

    async fn list_models(&self) -> ProviderResult<Vec<String>> {
        match self.fetch_model_ids().await {
            Ok(ids) => Ok(filter_key_models(&ids)),
            Err(e) => {
                warn!("Falling back to default OpenAI models: {}", e);
                Ok(DEFAULT_MODELS.iter().map(|m| m.to_string()).collect())
            }
        }
    }
}

/// Reduce a key's model listing to the chat models we offer
///
/// Each priority id matches exactly, or else its first dated variant
/// (`gpt-4o-2024-08-06`). With no match at all the priority list itself is offered.
pub fn filter_key_models(ids: &[String]) -> Vec<String> {
    let mut picked: Vec<String> = Vec::new();
    for wanted in PRIORITY_MODELS {
        if ids.iter().any(|id| id == wanted) {
            picked.push(wanted.to_string());
            continue;
        }
        let dated_prefix = format!("{}-", wanted);
        let earliest = ids
            .iter()
            .filter(|id| {
                id.strip_prefix(&dated_prefix)
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|c| c.is_ascii_digit())
            })
            .min();
        if let Some(id) = earliest {
            if !picked.contains(id) {
                picked.push(id.clone());
            }
        }
    }
    if picked.is_empty() {
        PRIORITY_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        picked
    }
}

/// Chat Completions stream state
///
/// Usage arrives in a trailing chunk only when the server honours
/// `include_usage`; otherwise both sides are estimated.
#[derive(Debug)]
pub(crate) struct OpenAiStream {
    prompt_estimate: u64,
    text: String,
    usage: Option<TokenUsage>,
    finish_reason: Option<String>,
    finished: bool,
}

impl OpenAiStream {
    pub(crate) fn new(messages: &[ChatMessage], system: Option<&str>) -> Self {
        Self {
            prompt_estimate: estimate_prompt_tokens(messages, system),
            text: String::new(),
            usage: None,
            finish_reason: None,
            finished: false,
        }
    }

    fn stop_event(&mut self) -> ChatEvent {
        self.finished = true;
        let usage = self
            .usage
            .unwrap_or_else(|| TokenUsage::new(self.prompt_estimate, estimate_tokens(&self.text)));
        ChatEvent::MessageStop {
            usage,
            cost: None,
            stop_reason: self.finish_reason.clone(),
        }
    }
}

impl StreamTranslator for OpenAiStream {
    fn on_frame(&mut self, frame: &SseFrame) -> ProviderResult<Option<ChatEvent>> {
        if frame.is_done() {
            return Ok(Some(self.stop_event()));
        }
        let data = frame.data.trim();
        if data.is_empty() {
            return Ok(None);
        }
        let chunk: Value = serde_json::from_str(data)
            .map_err(|e| ProviderError::Parse(format!("OpenAI stream chunk: {}", e)))?;

        if let Some(message) = chunk.pointer("/error/message").and_then(Value::as_str) {
            return Err(ProviderError::Stream(format!("OpenAI stream error: {}", message)));
        }
        if let Some(usage) = chunk.get("usage").filter(|u| !u.is_null()) {
            let input = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
            let output = usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0);
            self.usage = Some(TokenUsage::new(input, output));
        }
        if let Some(reason) = chunk.pointer("/choices/0/finish_reason").and_then(Value::as_str) {
            self.finish_reason = Some(reason.to_string());
        }

        match chunk.pointer("/choices/0/delta/content").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => {
                self.text.push_str(text);
                Ok(Some(ChatEvent::delta(text)))
            }
            _ => Ok(None),
        }
    }

    fn on_end(&mut self) -> ProviderResult<Option<ChatEvent>> {
        if self.finish_reason.is_some() {
            return Ok(Some(self.stop_event()));
        }
        Err(ProviderError::Stream(
            "OpenAI stream ended before completion".to_string(),
        ))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(payload: &str) -> SseFrame {
        SseFrame {
            data: payload.to_string(),
            ..Default::default()
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stream_with_reported_usage() {
        let mut s = OpenAiStream::new(&[ChatMessage::user("hi there")], None);

        assert_eq!(
            s.on_frame(&data(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#)).unwrap(),
            None
        );
        assert_eq!(
            s.on_frame(&data(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#)).unwrap(),
            Some(ChatEvent::delta("Hi"))
        );
        s.on_frame(&data(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#)).unwrap();
        s.on_frame(&data(r#"{"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":2}}"#))
            .unwrap();

        let stop = s.on_frame(&data("[DONE]")).unwrap();
        assert_eq!(
            stop,
            Some(ChatEvent::MessageStop {
                usage: TokenUsage::new(9, 2),
                cost: None,
                stop_reason: Some("stop".to_string()),
            })
        );
        assert!(s.is_finished());
    }

    #[test]
    fn test_stream_without_usage_is_estimated() {
        let mut s = OpenAiStream::new(&[ChatMessage::user("one two three four five six seven eight nine ten")], None);
        s.on_frame(&data(r#"{"choices":[{"delta":{"content":"alpha beta"}}]}"#)).unwrap();

        match s.on_frame(&data("[DONE]")).unwrap() {
            Some(ChatEvent::MessageStop { usage, .. }) => {
                assert_eq!(usage.input_tokens, 13);
                assert_eq!(usage.output_tokens, 2);
            }
            other => panic!("expected message_stop, got {:?}", other),
        }
    }

    #[test]
    fn test_end_without_finish_is_error() {
        let mut s = OpenAiStream::new(&[ChatMessage::user("hi")], None);
        s.on_frame(&data(r#"{"choices":[{"delta":{"content":"partial"}}]}"#)).unwrap();
        assert!(s.on_end().is_err());

        let mut finished = OpenAiStream::new(&[ChatMessage::user("hi")], None);
        finished
            .on_frame(&data(r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#))
            .unwrap();
        assert!(matches!(finished.on_end().unwrap(), Some(ChatEvent::MessageStop { .. })));
    }

    #[test]
    fn test_error_chunk_fails_stream() {
        let mut s = OpenAiStream::new(&[ChatMessage::user("hi")], None);
        let err = s
            .on_frame(&data(r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#))
            .unwrap_err();
        assert!(err.to_string().contains("Rate limit"));
    }

    #[test]
    fn test_filter_key_models_prefers_priority_order() {
        let listed = ids(&["whisper-1", "gpt-3.5-turbo", "gpt-4o-mini", "gpt-4o", "dall-e-3"]);
        assert_eq!(filter_key_models(&listed), ids(&["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"]));
    }

    #[test]
    fn test_filter_key_models_accepts_dated_variants() {
        let listed = ids(&["gpt-4-turbo-2024-04-09", "gpt-4-0613", "text-embedding-3-small"]);
        assert_eq!(filter_key_models(&listed), ids(&["gpt-4-turbo-2024-04-09", "gpt-4-0613"]));
    }

    #[test]
    fn test_filter_key_models_without_match_offers_priority_list() {
        let listed = ids(&["whisper-1", "dall-e-3", "ft:custom-model"]);
        assert_eq!(
            filter_key_models(&listed),
            ids(&["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4-turbo-preview", "gpt-4", "gpt-3.5-turbo"])
        );
        assert_eq!(filter_key_models(&[]).len(), 6);
    }
}
