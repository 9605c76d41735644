//! Saved prompt templates
//!
//! Prompt text may contain `{{name}}` placeholders. The variable list is
//! either given explicitly or extracted from the text in first-seen order.

use pmide_common::fuzzy::rank_fields;
use pmide_common::{time, uuid_utils, Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;

use super::require_name;
use crate::models::{RenderedPrompt, SavedPrompt, SavedPromptInput};

const COLUMNS: &str = "id, name, description, category, prompt_text, variables, framework_id, is_builtin, \
                       is_favorite, usage_count, last_used_at, sort_order, created_at, updated_at";

fn is_variable_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// Placeholder names in first-seen order, without duplicates
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        if !name.is_empty() && name.chars().all(is_variable_char) && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        rest = &after[end + 2..];
    }
    names
}

/// Substitute `{{name}}` placeholders; unknown ones are left in place and reported
pub fn render_template(text: &str, values: &HashMap<String, String>) -> RenderedPrompt {
    let mut out = String::with_capacity(text.len());
    let mut missing: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let raw = &after[..end];
        let name = raw.trim();
        match values.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(raw);
                out.push_str("}}");
                if !name.is_empty() && !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    RenderedPrompt { text: out, missing }
}

pub async fn list_saved_prompts(pool: &SqlitePool, category: Option<&str>) -> Result<Vec<SavedPrompt>> {
    let order = "ORDER BY is_favorite DESC, sort_order ASC, name ASC";
    let rows = match category {
        Some(category) => {
            sqlx::query_as::<_, SavedPrompt>(&format!(
                "SELECT {} FROM saved_prompts WHERE category = ? {}",
                COLUMNS, order
            ))
            .bind(category)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, SavedPrompt>(&format!("SELECT {} FROM saved_prompts {}", COLUMNS, order))
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}

pub async fn get_saved_prompt(pool: &SqlitePool, id: &str) -> Result<Option<SavedPrompt>> {
    let row = sqlx::query_as::<_, SavedPrompt>(&format!("SELECT {} FROM saved_prompts WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn require_saved_prompt(pool: &SqlitePool, id: &str) -> Result<SavedPrompt> {
    get_saved_prompt(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Prompt {}", id)))
}

fn variables_for(input: &SavedPromptInput) -> Vec<String> {
    match &input.variables {
        Some(vars) => {
            let mut unique: Vec<String> = Vec::with_capacity(vars.len());
            for v in vars.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
                if !unique.iter().any(|u| u == v) {
                    unique.push(v.to_string());
                }
            }
            unique
        }
        None => extract_variables(&input.prompt_text),
    }
}

fn validate(input: &SavedPromptInput) -> Result<()> {
    require_name("Prompt name", &input.name)?;
    if input.prompt_text.trim().is_empty() {
        return Err(Error::InvalidInput("Prompt text cannot be empty".to_string()));
    }
    Ok(())
}

pub async fn create_saved_prompt(pool: &SqlitePool, input: &SavedPromptInput) -> Result<SavedPrompt> {
    let mut tx = pool.begin().await?;
    let prompt = insert_prompt(&mut tx, input, None).await?;
    tx.commit().await?;
    Ok(prompt)
}

/// Insert a custom prompt inside an open transaction
pub(crate) async fn insert_prompt(
    tx: &mut Transaction<'_, Sqlite>,
    input: &SavedPromptInput,
    id_override: Option<String>,
) -> Result<SavedPrompt> {
    validate(input)?;
    let id = id_override
        .or_else(|| super::non_empty(input.id.as_deref()))
        .unwrap_or_else(uuid_utils::generate_id);

    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM saved_prompts WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut **tx)
        .await?;
    if exists.is_some() {
        return Err(Error::Conflict(format!("Prompt '{}' already exists", id)));
    }

    let now = time::now_secs();
    let prompt = SavedPrompt {
        id,
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        category: input.category.clone(),
        prompt_text: input.prompt_text.clone(),
        variables: variables_for(input),
        framework_id: super::non_empty(input.framework_id.as_deref()),
        is_builtin: false,
        is_favorite: input.is_favorite,
        usage_count: 0,
        last_used_at: None,
        sort_order: input.sort_order,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO saved_prompts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, 0, NULL, ?, ?, ?)",
        COLUMNS
    ))
    .bind(&prompt.id)
    .bind(&prompt.name)
    .bind(&prompt.description)
    .bind(&prompt.category)
    .bind(&prompt.prompt_text)
    .bind(serde_json::to_string(&prompt.variables)?)
    .bind(&prompt.framework_id)
    .bind(prompt.is_favorite)
    .bind(prompt.sort_order)
    .bind(prompt.created_at)
    .bind(prompt.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(prompt)
}

pub(crate) async fn overwrite_prompt(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
    input: &SavedPromptInput,
) -> Result<()> {
    validate(input)?;
    let result = sqlx::query(
        r#"
        UPDATE saved_prompts
        SET name = ?, description = ?, category = ?, prompt_text = ?, variables = ?,
            framework_id = ?, is_favorite = ?, sort_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(&input.category)
    .bind(&input.prompt_text)
    .bind(serde_json::to_string(&variables_for(input))?)
    .bind(super::non_empty(input.framework_id.as_deref()))
    .bind(input.is_favorite)
    .bind(input.sort_order)
    .bind(time::now_secs())
    .bind(id)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Prompt {}", id)));
    }
    Ok(())
}

pub async fn update_saved_prompt(pool: &SqlitePool, id: &str, input: &SavedPromptInput) -> Result<SavedPrompt> {
    let mut tx = pool.begin().await?;
    overwrite_prompt(&mut tx, id, input).await?;
    tx.commit().await?;
    require_saved_prompt(pool, id).await
}

pub async fn delete_saved_prompt(pool: &SqlitePool, id: &str) -> Result<()> {
    let prompt = require_saved_prompt(pool, id).await?;
    if prompt.is_builtin {
        return Err(Error::InvalidInput(format!("Built-in prompt '{}' cannot be deleted", id)));
    }
    sqlx::query("DELETE FROM saved_prompts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fuzzy search over name, description, category and text
pub async fn search_saved_prompts(pool: &SqlitePool, query: &str) -> Result<Vec<SavedPrompt>> {
    let prompts = list_saved_prompts(pool, None).await?;
    Ok(rank_fields(query, prompts, |p| {
        vec![
            (p.name.as_str(), 1.0),
            (p.description.as_str(), 0.6),
            (p.category.as_str(), 0.5),
            (p.prompt_text.as_str(), 0.4),
        ]
    })
    .into_iter()
    .map(|r| r.item)
    .collect())
}

pub async fn duplicate_saved_prompt(pool: &SqlitePool, id: &str, new_name: Option<&str>) -> Result<SavedPrompt> {
    let source = require_saved_prompt(pool, id).await?;
    let mut input = SavedPromptInput::from(&source);
    input.id = None;
    input.is_favorite = false;
    input.name = super::non_empty(new_name).unwrap_or_else(|| format!("{} (Copy)", source.name));
    create_saved_prompt(pool, &input).await
}

pub async fn increment_prompt_usage(pool: &SqlitePool, id: &str) -> Result<SavedPrompt> {
    let result = sqlx::query(
        "UPDATE saved_prompts SET usage_count = usage_count + 1, last_used_at = ? WHERE id = ?",
    )
    .bind(time::now_secs())
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Prompt {}", id)));
    }
    require_saved_prompt(pool, id).await
}

/// Fill a saved prompt's placeholders from `values`
pub async fn render_prompt(pool: &SqlitePool, id: &str, values: &HashMap<String, String>) -> Result<RenderedPrompt> {
    let prompt = require_saved_prompt(pool, id).await?;
    Ok(render_template(&prompt.prompt_text, values))
}
