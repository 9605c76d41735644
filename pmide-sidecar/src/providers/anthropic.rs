//! Anthropic Messages API client

use async_trait::async_trait;
use pmide_common::chat::{ChatEvent, TokenUsage};
use pmide_common::pricing::Provider;
use pmide_common::sse_parser::SseFrame;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    ensure_success, translate, ChatEventStream, ChatParams, ChatProvider, Completion, ProviderError,
    ProviderResult, StreamTranslator,
};

const PROVIDER: &str = "Anthropic";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Models offered in the picker; Anthropic has no key-scoped listing we use
pub const ANTHROPIC_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
];

pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn body(&self, params: &ChatParams, stream: bool) -> Value {
        let mut body = json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "messages": params.messages,
        });
        if let Some(system) = params.system_prompt() {
            body["system"] = json!(system);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(&self, body: &Value) -> ProviderResult<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await?;
        ensure_success(PROVIDER, response).await
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn chat(&self, params: &ChatParams) -> ProviderResult<Completion> {
        params.validate()?;
        info!("Calling Anthropic with model {} ({} messages)", params.model, params.messages.len());

        let response = self.send(&self.body(params, false)).await?;
        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Anthropic response: {}", e)))?;

        let content = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<String>();

        Ok(Completion {
            content,
            usage: TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
            model: parsed.model,
            stop_reason: parsed.stop_reason,
        })
    }

    async fn chat_stream(&self, params: &ChatParams) -> ProviderResult<ChatEventStream> {
        params.validate()?;
        info!("Streaming from Anthropic with model {} ({} messages)", params.model, params.messages.len());

        let response = self.send(&self.body(params, true)).await?;
        Ok(translate(response, AnthropicStream::default()))
    }

    async fn list_models(&self) -> ProviderResult<Vec<String>> {
        Ok(ANTHROPIC_MODELS.iter().map(|m| m.to_string()).collect())
    }
}

/// Messages stream state: usage arrives split across start and delta events
#[derive(Debug, Default)]
pub(crate) struct AnthropicStream {
    usage: TokenUsage,
    stop_reason: Option<String>,
    finished: bool,
}

impl StreamTranslator for AnthropicStream {
    fn on_frame(&mut self, frame: &SseFrame) -> ProviderResult<Option<ChatEvent>> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(data)
            .map_err(|e| ProviderError::Parse(format!("Anthropic stream event: {}", e)))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_else(|| frame.event_name());

        match kind {
            "message_start" => {
                if let Some(n) = value.pointer("/message/usage/input_tokens").and_then(Value::as_u64) {
                    self.usage.input_tokens = n;
                }
                if let Some(n) = value.pointer("/message/usage/output_tokens").and_then(Value::as_u64) {
                    self.usage.output_tokens = n;
                }
                Ok(None)
            }
            "content_block_delta" => {
                if value.pointer("/delta/type").and_then(Value::as_str) != Some("text_delta") {
                    return Ok(None);
                }
                match value.pointer("/delta/text").and_then(Value::as_str) {
                    Some(text) if !text.is_empty() => Ok(Some(ChatEvent::delta(text))),
                    _ => Ok(None),
                }
            }
            "message_delta" => {
                if let Some(n) = value.pointer("/usage/output_tokens").and_then(Value::as_u64) {
                    self.usage.output_tokens = n;
                }
                if let Some(reason) = value.pointer("/delta/stop_reason").and_then(Value::as_str) {
                    self.stop_reason = Some(reason.to_string());
                }
                Ok(None)
            }
            "message_stop" => {
                self.finished = true;
                Ok(Some(ChatEvent::MessageStop {
                    usage: self.usage,
                    cost: None,
                    stop_reason: self.stop_reason.clone(),
                }))
            }
            "error" => {
                let message = value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown streaming error");
                Err(ProviderError::Stream(format!("Anthropic stream error: {}", message)))
            }
            "ping" | "content_block_start" | "content_block_stop" => Ok(None),
            other => {
                debug!("Ignoring Anthropic stream event {}", other);
                Ok(None)
            }
        }
    }

    fn on_end(&mut self) -> ProviderResult<Option<ChatEvent>> {
        Err(ProviderError::Stream(
            "Anthropic stream ended before message_stop".to_string(),
        ))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_stream_translation() {
        let mut s = AnthropicStream::default();

        assert_eq!(
            s.on_frame(&frame(
                "message_start",
                r#"{"type":"message_start","message":{"usage":{"input_tokens":25,"output_tokens":1}}}"#
            ))
            .unwrap(),
            None
        );
        assert_eq!(s.on_frame(&frame("ping", r#"{"type":"ping"}"#)).unwrap(), None);
        assert_eq!(
            s.on_frame(&frame(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#
            ))
            .unwrap(),
            Some(ChatEvent::delta("Hello"))
        );
        s.on_frame(&frame(
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":15}}"#,
        ))
        .unwrap();

        let stop = s.on_frame(&frame("message_stop", r#"{"type":"message_stop"}"#)).unwrap();
        assert_eq!(
            stop,
            Some(ChatEvent::MessageStop {
                usage: TokenUsage::new(25, 15),
                cost: None,
                stop_reason: Some("end_turn".to_string()),
            })
        );
        assert!(s.is_finished());
    }

    #[test]
    fn test_non_text_deltas_are_ignored() {
        let mut s = AnthropicStream::default();
        let event = s
            .on_frame(&frame(
                "content_block_delta",
                r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            ))
            .unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn test_error_event_fails_stream() {
        let mut s = AnthropicStream::default();
        let err = s
            .on_frame(&frame(
                "error",
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            ))
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn test_premature_end_is_error() {
        let mut s = AnthropicStream::default();
        assert!(s.on_end().is_err());
    }
}
