//! Context documents attached to projects

use pmide_common::{time, uuid_utils, Error, Result};
use sqlx::SqlitePool;

use super::{projects, require_name};
use crate::models::{ContextDocument, ContextDocumentUpdate, NewContextDocument};

const COLUMNS: &str = "id, project_id, name, doc_type, content, url, is_global, size_bytes, \
                       folder_id, is_favorite, created_at, updated_at";

pub async fn create_context_document(pool: &SqlitePool, new: &NewContextDocument) -> Result<ContextDocument> {
    projects::require_project(pool, &new.project_id).await?;

    let now = time::now_secs();
    let doc = ContextDocument {
        id: uuid_utils::generate_id(),
        project_id: new.project_id.clone(),
        name: require_name("Document name", &new.name)?,
        doc_type: new.doc_type.as_str().to_string(),
        content: new.content.clone(),
        url: super::non_empty(new.url.as_deref()),
        is_global: new.is_global,
        size_bytes: new.content.len() as i64,
        folder_id: None,
        is_favorite: false,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO context_documents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        COLUMNS
    ))
    .bind(&doc.id)
    .bind(&doc.project_id)
    .bind(&doc.name)
    .bind(&doc.doc_type)
    .bind(&doc.content)
    .bind(&doc.url)
    .bind(doc.is_global)
    .bind(doc.size_bytes)
    .bind(&doc.folder_id)
    .bind(doc.is_favorite)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(pool)
    .await?;

    Ok(doc)
}

/// The project's documents plus global documents from every project
pub async fn list_context_documents(pool: &SqlitePool, project_id: &str) -> Result<Vec<ContextDocument>> {
    let rows = sqlx::query_as::<_, ContextDocument>(&format!(
        "SELECT {} FROM context_documents WHERE project_id = ? OR is_global = 1 ORDER BY created_at DESC, rowid DESC",
        COLUMNS
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_context_document(pool: &SqlitePool, id: &str) -> Result<Option<ContextDocument>> {
    let row = sqlx::query_as::<_, ContextDocument>(&format!(
        "SELECT {} FROM context_documents WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn update_context_document(
    pool: &SqlitePool,
    id: &str,
    update: &ContextDocumentUpdate,
) -> Result<ContextDocument> {
    let mut doc = get_context_document(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Document {}", id)))?;

    if let Some(name) = &update.name {
        doc.name = require_name("Document name", name)?;
    }
    if let Some(content) = &update.content {
        doc.size_bytes = content.len() as i64;
        doc.content = content.clone();
    }
    if let Some(is_global) = update.is_global {
        doc.is_global = is_global;
    }
    doc.updated_at = time::now_secs();

    sqlx::query(
        "UPDATE context_documents SET name = ?, content = ?, size_bytes = ?, is_global = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&doc.name)
    .bind(&doc.content)
    .bind(doc.size_bytes)
    .bind(doc.is_global)
    .bind(doc.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(doc)
}

pub async fn delete_context_document(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM context_documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Document {}", id)));
    }
    Ok(())
}

/// Documents by id, skipping ids that no longer exist
pub async fn get_context_documents_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<ContextDocument>> {
    let mut docs = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(doc) = get_context_document(pool, id).await? {
            docs.push(doc);
        }
    }
    Ok(docs)
}
