//! Row and request types for the store
//!
//! Timestamps are Unix seconds. Booleans are stored as SQLite integers and
//! JSON arrays as TEXT columns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use pmide_common::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub model: String,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub tokens: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenUsageRecord {
    pub id: String,
    pub conversation_id: Option<String>,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
    pub date: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageBucket {
    pub key: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
    pub requests: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_cost: f64,
    pub requests: i64,
    pub by_day: Vec<UsageBucket>,
    pub by_model: Vec<UsageBucket>,
}

/// Settings as exposed to the UI; the API key itself is never included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub api_key_set: bool,
    pub api_key_preview: Option<String>,
    pub default_model: String,
    pub max_tokens: i64,
    pub theme: String,
    pub sidecar_url: String,
    pub autosave: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub api_key: Option<String>,
    pub default_model: Option<String>,
    pub max_tokens: Option<i64>,
    pub theme: Option<String>,
    pub sidecar_url: Option<String>,
    pub autosave: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Pdf,
    Url,
    GoogleDoc,
    Text,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Pdf => "pdf",
            DocType::Url => "url",
            DocType::GoogleDoc => "google_doc",
            DocType::Text => "text",
        }
    }
}

impl FromStr for DocType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pdf" => Ok(DocType::Pdf),
            "url" => Ok(DocType::Url),
            "google_doc" => Ok(DocType::GoogleDoc),
            "text" => Ok(DocType::Text),
            other => Err(Error::InvalidInput(format!("Unknown document type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContextDocument {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub doc_type: String,
    pub content: String,
    pub url: Option<String>,
    pub is_global: bool,
    pub size_bytes: i64,
    pub folder_id: Option<String>,
    pub is_favorite: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContextDocument {
    pub project_id: String,
    pub name: String,
    pub doc_type: DocType,
    #[serde(default)]
    pub content: String,
    pub url: Option<String>,
    #[serde(default)]
    pub is_global: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDocumentUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub is_global: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FrameworkOutput {
    pub id: String,
    pub project_id: String,
    pub framework_id: String,
    pub category: String,
    pub name: String,
    pub user_prompt: String,
    #[sqlx(json)]
    pub context_doc_ids: Vec<String>,
    pub generated_content: String,
    pub format: String,
    pub folder_id: Option<String>,
    pub is_favorite: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFrameworkOutput {
    pub project_id: String,
    pub framework_id: String,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub context_doc_ids: Vec<String>,
    pub generated_content: String,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

fn default_format() -> OutputFormat {
    OutputFormat::Markdown
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkOutputUpdate {
    pub name: Option<String>,
    pub generated_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Folder {
    pub id: String,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub color: Option<String>,
    pub sort_order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Item kinds that can live in folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Document,
    Output,
}

impl ItemType {
    pub fn table(&self) -> &'static str {
        match self {
            ItemType::Document => "context_documents",
            ItemType::Output => "framework_outputs",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Document => f.write_str("document"),
            ItemType::Output => f.write_str("output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub item_type: String,
    pub id: String,
    pub name: String,
    pub folder_id: Option<String>,
    pub score: i64,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FrameworkCategoryRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub sort_order: i64,
    pub is_builtin: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FrameworkDefRow {
    pub id: String,
    pub category: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub system_prompt: String,
    #[sqlx(json)]
    pub guiding_questions: Vec<String>,
    pub example_output: String,
    pub supports_visuals: bool,
    pub visual_instructions: Option<String>,
    pub is_builtin: bool,
    pub is_modified: bool,
    pub sort_order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create/update payload for a framework definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkDefInput {
    pub id: Option<String>,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub system_prompt: String,
    #[serde(default)]
    pub guiding_questions: Vec<String>,
    #[serde(default)]
    pub example_output: String,
    #[serde(default)]
    pub supports_visuals: bool,
    #[serde(default)]
    pub visual_instructions: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

impl From<&FrameworkDefRow> for FrameworkDefInput {
    fn from(row: &FrameworkDefRow) -> Self {
        Self {
            id: Some(row.id.clone()),
            category: row.category.clone(),
            name: row.name.clone(),
            description: row.description.clone(),
            icon: row.icon.clone(),
            system_prompt: row.system_prompt.clone(),
            guiding_questions: row.guiding_questions.clone(),
            example_output: row.example_output.clone(),
            supports_visuals: row.supports_visuals,
            visual_instructions: row.visual_instructions.clone(),
            sort_order: row.sort_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SavedPrompt {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub prompt_text: String,
    #[sqlx(json)]
    pub variables: Vec<String>,
    pub framework_id: Option<String>,
    pub is_builtin: bool,
    pub is_favorite: bool,
    pub usage_count: i64,
    pub last_used_at: Option<i64>,
    pub sort_order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPromptInput {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_prompt_category")]
    pub category: String,
    pub prompt_text: String,
    /// Explicit variable list; extracted from `prompt_text` when absent
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    #[serde(default)]
    pub framework_id: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_prompt_category() -> String {
    "general".to_string()
}

impl From<&SavedPrompt> for SavedPromptInput {
    fn from(p: &SavedPrompt) -> Self {
        Self {
            id: Some(p.id.clone()),
            name: p.name.clone(),
            description: p.description.clone(),
            category: p.category.clone(),
            prompt_text: p.prompt_text.clone(),
            variables: Some(p.variables.clone()),
            framework_id: p.framework_id.clone(),
            is_favorite: p.is_favorite,
            sort_order: p.sort_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub text: String,
    pub missing: Vec<String>,
}
