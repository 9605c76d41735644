//! Model pricing and token accounting
//!
//! Prices are USD per million tokens. Lookup tries the exact model id, then
//! the longest known prefix so dated variants (`gpt-4o-2024-05-13`) price
//! like their family. Unknown models fall back to the provider default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::{ChatMessage, TokenUsage};
use crate::{Error, Result};

/// Upstream LLM vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    /// Infer the vendor from a model id
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("claude") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            other => Err(Error::InvalidInput(format!("Unknown provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

const fn price(input_per_mtok: f64, output_per_mtok: f64) -> ModelPrice {
    ModelPrice { input_per_mtok, output_per_mtok }
}

const ANTHROPIC_DEFAULT: ModelPrice = price(3.0, 15.0);
const OPENAI_DEFAULT: ModelPrice = price(10.0, 30.0);

const ANTHROPIC_PRICES: &[(&str, ModelPrice)] = &[
    ("claude-3-5-sonnet-20241022", price(3.0, 15.0)),
    ("claude-3-opus-20240229", price(15.0, 75.0)),
    ("claude-3-5-haiku-20241022", price(1.0, 5.0)),
    ("claude-3-5-sonnet", price(3.0, 15.0)),
    ("claude-3-opus", price(15.0, 75.0)),
    ("claude-3-5-haiku", price(1.0, 5.0)),
    ("claude-sonnet", price(3.0, 15.0)),
    ("claude-opus", price(15.0, 75.0)),
    ("claude-haiku", price(1.0, 5.0)),
];

const OPENAI_PRICES: &[(&str, ModelPrice)] = &[
    ("gpt-4-turbo-preview", price(10.0, 30.0)),
    ("gpt-4-turbo", price(10.0, 30.0)),
    ("gpt-4", price(30.0, 60.0)),
    ("gpt-3.5-turbo", price(0.5, 1.5)),
    ("gpt-4o", price(5.0, 15.0)),
    ("gpt-4o-mini", price(0.15, 0.6)),
];

fn lookup(table: &[(&str, ModelPrice)], model: &str) -> Option<ModelPrice> {
    if let Some((_, p)) = table.iter().find(|(name, _)| *name == model) {
        return Some(*p);
    }
    table
        .iter()
        .filter(|(name, _)| model.starts_with(name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, p)| *p)
}

/// Price sheet entry for `model`
pub fn price_for(model: &str) -> ModelPrice {
    match Provider::for_model(model) {
        Provider::Anthropic => lookup(ANTHROPIC_PRICES, model).unwrap_or(ANTHROPIC_DEFAULT),
        Provider::OpenAi => lookup(OPENAI_PRICES, model).unwrap_or(OPENAI_DEFAULT),
    }
}

/// Cost in USD of a completion
pub fn calculate_cost(model: &str, usage: &TokenUsage) -> f64 {
    let p = price_for(model);
    usage.input_tokens as f64 * p.input_per_mtok / 1_000_000.0
        + usage.output_tokens as f64 * p.output_per_mtok / 1_000_000.0
}

/// Rough token count (words × 1.3) for streams that report no usage
pub fn estimate_tokens(text: &str) -> u64 {
    word_weight(text) as u64
}

/// Prompt-side estimate across a whole conversation plus system prompt
pub fn estimate_prompt_tokens(messages: &[ChatMessage], system: Option<&str>) -> u64 {
    let total: f64 = system.map(word_weight).unwrap_or(0.0)
        + messages.iter().map(|m| word_weight(&m.content)).sum::<f64>();
    total as u64
}

fn word_weight(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * 1.3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_provider_inference() {
        assert_eq!(Provider::for_model("claude-sonnet-4"), Provider::Anthropic);
        assert_eq!(Provider::for_model("gpt-4o"), Provider::OpenAi);
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
    }

    #[test]
    fn test_exact_prices() {
        assert_eq!(price_for("gpt-4o-mini"), price(0.15, 0.6));
        assert_eq!(price_for("claude-3-opus-20240229"), price(15.0, 75.0));
        assert_eq!(price_for("gpt-4"), price(30.0, 60.0));
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(price_for("gpt-4o-2024-05-13"), price(5.0, 15.0));
        assert_eq!(price_for("gpt-4o-mini-2024-07-18"), price(0.15, 0.6));
        assert_eq!(price_for("gpt-4-0613"), price(30.0, 60.0));
    }

    #[test]
    fn test_unknown_models_use_provider_default() {
        assert_eq!(price_for("gpt-5"), OPENAI_DEFAULT);
        assert_eq!(price_for("claude-sonnet-4"), ANTHROPIC_DEFAULT);
    }

    #[test]
    fn test_calculate_cost() {
        let usage = TokenUsage::new(1000, 500);
        // 1000 * 3/1M + 500 * 15/1M
        assert!(approx(calculate_cost("claude-3-5-sonnet-20241022", &usage), 0.0105));
        assert!(approx(calculate_cost("gpt-4o", &TokenUsage::default()), 0.0));
    }

    #[test]
    fn test_estimates() {
        assert_eq!(estimate_tokens("one two three four five six seven eight nine ten"), 13);
        assert_eq!(estimate_tokens(""), 0);
        let msgs = vec![ChatMessage::user("a b c"), ChatMessage::assistant("d e")];
        // (2 + 3 + 2) * 1.3 = 9.1
        assert_eq!(estimate_prompt_tokens(&msgs, Some("be brief")), 9);
    }
}
