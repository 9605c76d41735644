//! Generated framework outputs

use pmide_common::{time, uuid_utils, Error, Result};
use sqlx::SqlitePool;

use super::{projects, require_name};
use crate::models::{FrameworkOutput, FrameworkOutputUpdate, NewFrameworkOutput};

const COLUMNS: &str = "id, project_id, framework_id, category, name, user_prompt, context_doc_ids, \
                       generated_content, format, folder_id, is_favorite, created_at, updated_at";

pub async fn create_framework_output(pool: &SqlitePool, new: &NewFrameworkOutput) -> Result<FrameworkOutput> {
    projects::require_project(pool, &new.project_id).await?;

    let now = time::now_secs();
    let output = FrameworkOutput {
        id: uuid_utils::generate_id(),
        project_id: new.project_id.clone(),
        framework_id: new.framework_id.clone(),
        category: new.category.clone(),
        name: require_name("Output name", &new.name)?,
        user_prompt: new.user_prompt.clone(),
        context_doc_ids: new.context_doc_ids.clone(),
        generated_content: new.generated_content.clone(),
        format: new.format.as_str().to_string(),
        folder_id: None,
        is_favorite: false,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO framework_outputs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        COLUMNS
    ))
    .bind(&output.id)
    .bind(&output.project_id)
    .bind(&output.framework_id)
    .bind(&output.category)
    .bind(&output.name)
    .bind(&output.user_prompt)
    .bind(serde_json::to_string(&output.context_doc_ids)?)
    .bind(&output.generated_content)
    .bind(&output.format)
    .bind(&output.folder_id)
    .bind(output.is_favorite)
    .bind(output.created_at)
    .bind(output.updated_at)
    .execute(pool)
    .await?;

    Ok(output)
}

pub async fn list_framework_outputs(pool: &SqlitePool, project_id: &str) -> Result<Vec<FrameworkOutput>> {
    let rows = sqlx::query_as::<_, FrameworkOutput>(&format!(
        "SELECT {} FROM framework_outputs WHERE project_id = ? ORDER BY created_at DESC, rowid DESC",
        COLUMNS
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_framework_output(pool: &SqlitePool, id: &str) -> Result<Option<FrameworkOutput>> {
    let row = sqlx::query_as::<_, FrameworkOutput>(&format!(
        "SELECT {} FROM framework_outputs WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn update_framework_output(
    pool: &SqlitePool,
    id: &str,
    update: &FrameworkOutputUpdate,
) -> Result<FrameworkOutput> {
    let mut output = get_framework_output(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Output {}", id)))?;

    if let Some(name) = &update.name {
        output.name = require_name("Output name", name)?;
    }
    if let Some(content) = &update.generated_content {
        output.generated_content = content.clone();
    }
    output.updated_at = time::now_secs();

    sqlx::query("UPDATE framework_outputs SET name = ?, generated_content = ?, updated_at = ? WHERE id = ?")
        .bind(&output.name)
        .bind(&output.generated_content)
        .bind(output.updated_at)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(output)
}

pub async fn delete_framework_output(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM framework_outputs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Output {}", id)));
    }
    Ok(())
}
