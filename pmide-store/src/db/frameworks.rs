//! Framework categories and definitions
//!
//! Built-in rows come from the shipped catalog. They can be edited (and are
//! then flagged `is_modified`) and reset, but never deleted.

use pmide_common::frameworks::builtin_framework;
use pmide_common::fuzzy::rank_fields;
use pmide_common::{time, uuid_utils, Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::require_name;
use crate::models::{CategoryInput, FrameworkCategoryRow, FrameworkDefInput, FrameworkDefRow};

const CATEGORY_COLUMNS: &str = "id, name, description, icon, sort_order, is_builtin, created_at, updated_at";
const DEF_COLUMNS: &str = "id, category, name, description, icon, system_prompt, guiding_questions, \
                           example_output, supports_visuals, visual_instructions, is_builtin, is_modified, \
                           sort_order, created_at, updated_at";

/// Lowercase slug from a display name: `"My Thing!"` → `"my-thing"`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub async fn list_framework_categories(pool: &SqlitePool) -> Result<Vec<FrameworkCategoryRow>> {
    let rows = sqlx::query_as::<_, FrameworkCategoryRow>(&format!(
        "SELECT {} FROM framework_categories ORDER BY sort_order ASC, name ASC",
        CATEGORY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_framework_category(pool: &SqlitePool, id: &str) -> Result<Option<FrameworkCategoryRow>> {
    let row = sqlx::query_as::<_, FrameworkCategoryRow>(&format!(
        "SELECT {} FROM framework_categories WHERE id = ?",
        CATEGORY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create_framework_category(pool: &SqlitePool, input: &CategoryInput) -> Result<FrameworkCategoryRow> {
    let mut tx = pool.begin().await?;
    let row = insert_category(&mut tx, input).await?;
    tx.commit().await?;
    Ok(row)
}

/// Insert a custom category inside an open transaction
pub(crate) async fn insert_category(
    tx: &mut Transaction<'_, Sqlite>,
    input: &CategoryInput,
) -> Result<FrameworkCategoryRow> {
    let name = require_name("Category name", &input.name)?;
    let id = match super::non_empty(input.id.as_deref()) {
        Some(id) => id,
        None => slugify(&name),
    };
    if id.is_empty() {
        return Err(Error::InvalidInput("Category id cannot be empty".to_string()));
    }

    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM framework_categories WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut **tx)
        .await?;
    if exists.is_some() {
        return Err(Error::Conflict(format!("Category '{}' already exists", id)));
    }

    let now = time::now_secs();
    let row = FrameworkCategoryRow {
        id,
        name,
        description: input.description.clone(),
        icon: input.icon.clone(),
        sort_order: input.sort_order,
        is_builtin: false,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO framework_categories ({}) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        CATEGORY_COLUMNS
    ))
    .bind(&row.id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.icon)
    .bind(row.sort_order)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(row)
}

pub async fn update_framework_category(
    pool: &SqlitePool,
    id: &str,
    input: &CategoryInput,
) -> Result<FrameworkCategoryRow> {
    let name = require_name("Category name", &input.name)?;
    let result = sqlx::query(
        "UPDATE framework_categories SET name = ?, description = ?, icon = ?, sort_order = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&input.description)
    .bind(&input.icon)
    .bind(input.sort_order)
    .bind(time::now_secs())
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Category {}", id)));
    }
    get_framework_category(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
}

pub async fn delete_framework_category(pool: &SqlitePool, id: &str) -> Result<()> {
    let category = get_framework_category(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Category {}", id)))?;
    if category.is_builtin {
        return Err(Error::InvalidInput(format!("Built-in category '{}' cannot be deleted", id)));
    }

    let in_use: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM framework_defs WHERE category = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if in_use > 0 {
        return Err(Error::Conflict(format!(
            "Category '{}' still holds {} framework(s)",
            id, in_use
        )));
    }

    sqlx::query("DELETE FROM framework_categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

pub async fn list_framework_defs(pool: &SqlitePool, category: Option<&str>) -> Result<Vec<FrameworkDefRow>> {
    let rows = match category {
        Some(category) => {
            sqlx::query_as::<_, FrameworkDefRow>(&format!(
                "SELECT {} FROM framework_defs WHERE category = ? ORDER BY sort_order ASC, name ASC",
                DEF_COLUMNS
            ))
            .bind(category)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, FrameworkDefRow>(&format!(
                "SELECT {} FROM framework_defs ORDER BY category ASC, sort_order ASC, name ASC",
                DEF_COLUMNS
            ))
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

pub async fn get_framework_def(pool: &SqlitePool, id: &str) -> Result<Option<FrameworkDefRow>> {
    let row = sqlx::query_as::<_, FrameworkDefRow>(&format!(
        "SELECT {} FROM framework_defs WHERE id = ?",
        DEF_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn require_framework_def(pool: &SqlitePool, id: &str) -> Result<FrameworkDefRow> {
    get_framework_def(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Framework {}", id)))
}

fn validate_def(input: &FrameworkDefInput) -> Result<()> {
    require_name("Framework name", &input.name)?;
    require_name("Framework category", &input.category)?;
    if input.system_prompt.trim().is_empty() {
        return Err(Error::InvalidInput("System prompt cannot be empty".to_string()));
    }
    Ok(())
}

/// Create a custom (non-built-in) framework
pub async fn create_framework_def(pool: &SqlitePool, input: &FrameworkDefInput) -> Result<FrameworkDefRow> {
    let mut tx = pool.begin().await?;
    let row = insert_def(&mut tx, input, None).await?;
    tx.commit().await?;
    Ok(row)
}

async fn category_exists(tx: &mut Transaction<'_, Sqlite>, id: &str) -> Result<bool> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM framework_categories WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(found.is_some())
}

/// Insert a custom framework; `id_override` takes precedence over `input.id`
pub(crate) async fn insert_def(
    tx: &mut Transaction<'_, Sqlite>,
    input: &FrameworkDefInput,
    id_override: Option<String>,
) -> Result<FrameworkDefRow> {
    validate_def(input)?;
    if !category_exists(tx, input.category.trim()).await? {
        return Err(Error::InvalidInput(format!("Unknown category '{}'", input.category)));
    }

    let id = id_override
        .or_else(|| super::non_empty(input.id.as_deref()))
        .unwrap_or_else(uuid_utils::generate_id);
    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM framework_defs WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut **tx)
        .await?;
    if exists.is_some() {
        return Err(Error::Conflict(format!("Framework '{}' already exists", id)));
    }

    let now = time::now_secs();
    let row = FrameworkDefRow {
        id,
        category: input.category.trim().to_string(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        icon: input.icon.clone(),
        system_prompt: input.system_prompt.clone(),
        guiding_questions: input.guiding_questions.clone(),
        example_output: input.example_output.clone(),
        supports_visuals: input.supports_visuals,
        visual_instructions: input.visual_instructions.clone(),
        is_builtin: false,
        is_modified: false,
        sort_order: input.sort_order,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO framework_defs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?)",
        DEF_COLUMNS
    ))
    .bind(&row.id)
    .bind(&row.category)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.icon)
    .bind(&row.system_prompt)
    .bind(serde_json::to_string(&row.guiding_questions)?)
    .bind(&row.example_output)
    .bind(row.supports_visuals)
    .bind(&row.visual_instructions)
    .bind(row.sort_order)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(row)
}

/// Overwrite the editable fields of an existing definition inside a transaction
///
/// Built-ins stay built-in and are flagged as modified.
pub(crate) async fn overwrite_def(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
    input: &FrameworkDefInput,
) -> Result<()> {
    validate_def(input)?;
    if !category_exists(tx, input.category.trim()).await? {
        return Err(Error::InvalidInput(format!("Unknown category '{}'", input.category)));
    }

    let result = sqlx::query(
        r#"
        UPDATE framework_defs
        SET category = ?, name = ?, description = ?, icon = ?, system_prompt = ?,
            guiding_questions = ?, example_output = ?, supports_visuals = ?,
            visual_instructions = ?, sort_order = ?,
            is_modified = CASE WHEN is_builtin = 1 THEN 1 ELSE 0 END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(input.category.trim())
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(&input.icon)
    .bind(&input.system_prompt)
    .bind(serde_json::to_string(&input.guiding_questions)?)
    .bind(&input.example_output)
    .bind(input.supports_visuals)
    .bind(&input.visual_instructions)
    .bind(input.sort_order)
    .bind(time::now_secs())
    .bind(id)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Framework {}", id)));
    }
    Ok(())
}

pub async fn update_framework_def(pool: &SqlitePool, id: &str, input: &FrameworkDefInput) -> Result<FrameworkDefRow> {
    let mut tx = pool.begin().await?;
    overwrite_def(&mut tx, id, input).await?;
    tx.commit().await?;
    require_framework_def(pool, id).await
}

pub async fn delete_framework_def(pool: &SqlitePool, id: &str) -> Result<()> {
    let def = require_framework_def(pool, id).await?;
    if def.is_builtin {
        return Err(Error::InvalidInput(format!("Built-in framework '{}' cannot be deleted", id)));
    }
    sqlx::query("DELETE FROM framework_defs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Restore a built-in definition from the shipped catalog
pub async fn reset_framework_def(pool: &SqlitePool, id: &str) -> Result<FrameworkDefRow> {
    let def = require_framework_def(pool, id).await?;
    if !def.is_builtin {
        return Err(Error::InvalidInput(format!("Framework '{}' is not built-in", id)));
    }
    let original = builtin_framework(id)
        .ok_or_else(|| Error::Internal(format!("Built-in framework '{}' missing from catalog", id)))?;

    sqlx::query(
        r#"
        UPDATE framework_defs
        SET category = ?, name = ?, description = ?, icon = ?, system_prompt = ?,
            guiding_questions = ?, example_output = ?, supports_visuals = ?,
            visual_instructions = ?, is_modified = 0, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&original.category)
    .bind(&original.name)
    .bind(&original.description)
    .bind(&original.icon)
    .bind(&original.system_prompt)
    .bind(serde_json::to_string(&original.guiding_questions)?)
    .bind(&original.example_output)
    .bind(original.supports_visuals)
    .bind(&original.visual_instructions)
    .bind(time::now_secs())
    .bind(id)
    .execute(pool)
    .await?;

    require_framework_def(pool, id).await
}

/// Fuzzy search over name, description and category
pub async fn search_framework_defs(pool: &SqlitePool, query: &str) -> Result<Vec<FrameworkDefRow>> {
    let defs = list_framework_defs(pool, None).await?;
    Ok(rank_fields(query, defs, |d| {
        vec![
            (d.name.as_str(), 1.0),
            (d.description.as_str(), 0.6),
            (d.category.as_str(), 0.5),
        ]
    })
    .into_iter()
    .map(|r| r.item)
    .collect())
}

/// Custom copy of any definition, named "<name> (Copy)" unless a name is given
pub async fn duplicate_framework_def(pool: &SqlitePool, id: &str, new_name: Option<&str>) -> Result<FrameworkDefRow> {
    let source = require_framework_def(pool, id).await?;
    let mut input = FrameworkDefInput::from(&source);
    input.id = None;
    input.name = super::non_empty(new_name).unwrap_or_else(|| format!("{} (Copy)", source.name));
    create_framework_def(pool, &input).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Go To Market"), "go-to-market");
        assert_eq!(slugify("  R&D -- Ideas! "), "r-d-ideas");
        assert_eq!(slugify("***"), "");
    }
}
