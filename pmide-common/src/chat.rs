//! Chat wire types and the streaming accumulator
//!
//! The sidecar emits [`ChatEvent`]s as SSE `data:` payloads. Clients decode
//! them with [`crate::sse_parser::SseDecoder`] and fold them through a
//! [`ChatAccumulator`] to get the final text, usage and cost.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pricing;
use crate::sse_parser::SseFrame;
use crate::{Error, Result};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Token counts reported (or estimated) for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self { input_tokens, output_tokens }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDelta {
    pub text: String,
}

/// Normalized streaming event, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    ConversationId {
        conversation_id: String,
    },
    ContentBlockDelta {
        delta: TextDelta,
    },
    MessageStop {
        usage: TokenUsage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cost: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    Error {
        error: String,
    },
}

impl ChatEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        ChatEvent::ContentBlockDelta { delta: TextDelta { text: text.into() } }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ChatEvent::Error { error: message.into() }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::ConversationId { .. } => "conversation_id",
            ChatEvent::ContentBlockDelta { .. } => "content_block_delta",
            ChatEvent::MessageStop { .. } => "message_stop",
            ChatEvent::Error { .. } => "error",
        }
    }

    /// Decode an SSE frame; `[DONE]` and empty payloads carry no event
    pub fn from_frame(frame: &SseFrame) -> Result<Option<Self>> {
        let data = frame.data.trim();
        if data.is_empty() || frame.is_done() {
            return Ok(None);
        }
        serde_json::from_str(data)
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("Malformed chat event: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What a single [`ChatAccumulator::apply`] did to the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorStep {
    Continue,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
enum StreamState {
    Streaming,
    Completed,
    Failed(String),
}

/// Final result of a completed stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub conversation_id: Option<String>,
    pub content: String,
    pub usage: TokenUsage,
    pub cost: f64,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// Folds a sequence of [`ChatEvent`]s into text, usage and cost
#[derive(Debug, Clone)]
pub struct ChatAccumulator {
    model: String,
    conversation_id: Option<String>,
    text: String,
    usage: TokenUsage,
    cost: f64,
    stop_reason: Option<String>,
    state: StreamState,
}

impl ChatAccumulator {
    /// `model` prices the stream when the stop event carries no cost
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            conversation_id: None,
            text: String::new(),
            usage: TokenUsage::default(),
            cost: 0.0,
            stop_reason: None,
            state: StreamState::Streaming,
        }
    }

    pub fn apply(&mut self, event: ChatEvent) -> Result<AccumulatorStep> {
        if self.state != StreamState::Streaming {
            return Err(Error::InvalidInput(format!(
                "Received {} after stream finished",
                event.event_type()
            )));
        }

        match event {
            ChatEvent::ConversationId { conversation_id } => {
                self.conversation_id = Some(conversation_id);
                Ok(AccumulatorStep::Continue)
            }
            ChatEvent::ContentBlockDelta { delta } => {
                self.text.push_str(&delta.text);
                Ok(AccumulatorStep::Continue)
            }
            ChatEvent::MessageStop { usage, cost, stop_reason } => {
                self.usage = usage;
                self.cost = cost.unwrap_or_else(|| pricing::calculate_cost(&self.model, &usage));
                self.stop_reason = stop_reason;
                self.state = StreamState::Completed;
                Ok(AccumulatorStep::Completed)
            }
            ChatEvent::Error { error } => {
                self.state = StreamState::Failed(error);
                Ok(AccumulatorStep::Failed)
            }
        }
    }

    /// Text received so far (partial until completion)
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.state != StreamState::Streaming
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            StreamState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_outcome(self) -> Result<ChatOutcome> {
        match self.state {
            StreamState::Completed => Ok(ChatOutcome {
                conversation_id: self.conversation_id,
                content: self.text,
                usage: self.usage,
                cost: self.cost,
                model: self.model,
                stop_reason: self.stop_reason,
            }),
            StreamState::Failed(e) => Err(Error::Internal(e)),
            StreamState::Streaming => {
                Err(Error::Internal("stream ended before completion".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse_parser::SseDecoder;

    #[test]
    fn test_wire_format_matches_sidecar_convention() {
        let json = ChatEvent::delta("Hi").to_json().unwrap();
        assert_eq!(json, r#"{"type":"content_block_delta","delta":{"text":"Hi"}}"#);

        let stop = ChatEvent::MessageStop {
            usage: TokenUsage::new(3, 4),
            cost: Some(0.5),
            stop_reason: None,
        };
        assert_eq!(
            stop.to_json().unwrap(),
            r#"{"type":"message_stop","usage":{"input_tokens":3,"output_tokens":4},"cost":0.5}"#
        );
    }

    #[test]
    fn test_decode_stream_and_accumulate() {
        let wire = concat!(
            "data: {\"type\":\"conversation_id\",\"conversation_id\":\"conv-1\"}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hel\"}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"lo\"}}\n\n",
            "data: {\"type\":\"message_stop\",\"usage\":{\"input_tokens\":10,\"output_tokens\":2},\"cost\":0.01}\n\n",
        );
        let mut decoder = SseDecoder::new();
        let mut acc = ChatAccumulator::new("gpt-4o");
        for chunk in wire.as_bytes().chunks(7) {
            for frame in decoder.feed(chunk) {
                if let Some(event) = ChatEvent::from_frame(&frame).unwrap() {
                    acc.apply(event).unwrap();
                }
            }
        }
        assert!(acc.is_finished());
        let outcome = acc.into_outcome().unwrap();
        assert_eq!(outcome.content, "Hello");
        assert_eq!(outcome.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(outcome.usage.total(), 12);
        assert!((outcome.cost - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_cost_is_priced_from_model() {
        let mut acc = ChatAccumulator::new("gpt-4o");
        acc.apply(ChatEvent::MessageStop {
            usage: TokenUsage::new(1_000_000, 0),
            cost: None,
            stop_reason: Some("end_turn".to_string()),
        })
        .unwrap();
        assert!((acc.cost() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_keeps_partial_text() {
        let mut acc = ChatAccumulator::new("claude-3-5-sonnet-20241022");
        acc.apply(ChatEvent::delta("partial")).unwrap();
        let step = acc.apply(ChatEvent::error("overloaded")).unwrap();
        assert_eq!(step, AccumulatorStep::Failed);
        assert_eq!(acc.text(), "partial");
        assert_eq!(acc.error(), Some("overloaded"));
        assert!(acc.into_outcome().is_err());
    }

    #[test]
    fn test_events_after_completion_are_rejected() {
        let mut acc = ChatAccumulator::new("gpt-4o");
        acc.apply(ChatEvent::MessageStop { usage: TokenUsage::default(), cost: Some(0.0), stop_reason: None })
            .unwrap();
        assert!(acc.apply(ChatEvent::delta("late")).is_err());
    }

    #[test]
    fn test_premature_end_is_an_error() {
        let mut acc = ChatAccumulator::new("gpt-4o");
        acc.apply(ChatEvent::delta("half")).unwrap();
        let err = acc.into_outcome().unwrap_err();
        assert!(err.to_string().contains("before completion"));
    }

    #[test]
    fn test_done_and_malformed_frames() {
        let done = SseFrame { data: "[DONE]".to_string(), ..Default::default() };
        assert_eq!(ChatEvent::from_frame(&done).unwrap(), None);

        let bad = SseFrame { data: "{not json".to_string(), ..Default::default() };
        assert!(ChatEvent::from_frame(&bad).is_err());
    }

    #[test]
    fn test_role_round_trip_from_str() {
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("robot".parse::<Role>().is_err());
    }
}
