//! Conversations and their messages

use pmide_common::chat::Role;
use pmide_common::{time, uuid_utils, Error, Result};
use sqlx::SqlitePool;

use super::{projects, require_name};
use crate::models::{Conversation, Message};

const COLUMNS: &str = "id, project_id, title, model, total_tokens, total_cost, created_at, updated_at";

pub const DEFAULT_TITLE: &str = "New Conversation";

pub async fn create_conversation(
    pool: &SqlitePool,
    project_id: &str,
    title: Option<&str>,
    model: &str,
) -> Result<Conversation> {
    projects::require_project(pool, project_id).await?;

    let now = time::now_secs();
    let conversation = Conversation {
        id: uuid_utils::generate_id(),
        project_id: project_id.to_string(),
        title: super::non_empty(title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        model: require_name("Model", model)?,
        total_tokens: 0,
        total_cost: 0.0,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO conversations (id, project_id, title, model, total_tokens, total_cost, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(&conversation.id)
    .bind(&conversation.project_id)
    .bind(&conversation.title)
    .bind(&conversation.model)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(conversation)
}

pub async fn list_conversations(pool: &SqlitePool, project_id: &str) -> Result<Vec<Conversation>> {
    let rows = sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {} FROM conversations WHERE project_id = ? ORDER BY updated_at DESC, rowid DESC",
        COLUMNS
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_conversation(pool: &SqlitePool, id: &str) -> Result<Option<Conversation>> {
    let row = sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {} FROM conversations WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn require_conversation(pool: &SqlitePool, id: &str) -> Result<Conversation> {
    get_conversation(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Conversation {}", id)))
}

pub async fn rename_conversation(pool: &SqlitePool, id: &str, title: &str) -> Result<Conversation> {
    let title = require_name("Conversation title", title)?;
    let result = sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
        .bind(&title)
        .bind(time::now_secs())
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Conversation {}", id)));
    }
    require_conversation(pool, id).await
}

/// Delete a conversation and its messages
pub async fn delete_conversation(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Conversation {}", id)));
    }
    Ok(())
}

/// Append a message and touch the conversation
pub async fn add_message(
    pool: &SqlitePool,
    conversation_id: &str,
    role: Role,
    content: &str,
    tokens: Option<i64>,
) -> Result<Message> {
    let now = time::now_secs();
    let message = Message {
        id: uuid_utils::generate_id(),
        conversation_id: conversation_id.to_string(),
        role: role.as_str().to_string(),
        content: content.to_string(),
        tokens,
        created_at: now,
    };

    let mut tx = pool.begin().await?;

    let touched = sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Conversation {}", conversation_id)));
    }

    sqlx::query(
        "INSERT INTO messages (id, conversation_id, role, content, tokens, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.conversation_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(message.tokens)
    .bind(message.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(message)
}

/// Messages in chronological order; same-second ties keep insertion order
pub async fn get_messages(pool: &SqlitePool, conversation_id: &str) -> Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, role, content, tokens, created_at
        FROM messages WHERE conversation_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Add to the running token and cost totals
pub async fn update_conversation_stats(
    pool: &SqlitePool,
    id: &str,
    tokens_delta: i64,
    cost_delta: f64,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET total_tokens = total_tokens + ?, total_cost = total_cost + ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(tokens_delta)
    .bind(cost_delta)
    .bind(time::now_secs())
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Conversation {}", id)));
    }
    Ok(())
}
