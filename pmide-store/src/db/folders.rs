//! Folder tree and item placement
//!
//! Folders nest through `parent_id` within one project. Documents and
//! outputs point at a folder through `folder_id`; `NULL` is the project root.

use pmide_common::{time, uuid_utils, Error, Result};
use sqlx::SqlitePool;

use super::{projects, require_name};
use crate::models::{Folder, ItemType};

const COLUMNS: &str = "id, project_id, parent_id, name, color, sort_order, created_at, updated_at";

/// Accepts `#rrggbb` (any case)
pub fn validate_color(color: &str) -> Result<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid color '{}', expected #rrggbb", color)))
    }
}

pub async fn get_folder(pool: &SqlitePool, id: &str) -> Result<Option<Folder>> {
    let row = sqlx::query_as::<_, Folder>(&format!("SELECT {} FROM folders WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

async fn require_folder(pool: &SqlitePool, id: &str) -> Result<Folder> {
    get_folder(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Folder {}", id)))
}

/// The parent must exist in the same project
async fn check_parent(pool: &SqlitePool, project_id: &str, parent_id: &str) -> Result<()> {
    let parent = require_folder(pool, parent_id).await?;
    if parent.project_id != project_id {
        return Err(Error::InvalidInput(format!(
            "Folder {} belongs to a different project",
            parent_id
        )));
    }
    Ok(())
}

pub async fn create_folder(
    pool: &SqlitePool,
    project_id: &str,
    name: &str,
    parent_id: Option<&str>,
    color: Option<&str>,
) -> Result<Folder> {
    projects::require_project(pool, project_id).await?;
    let name = require_name("Folder name", name)?;
    if let Some(parent_id) = parent_id {
        check_parent(pool, project_id, parent_id).await?;
    }
    if let Some(color) = color {
        validate_color(color)?;
    }

    let sort_order: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM folders WHERE project_id = ? AND parent_id IS ?",
    )
    .bind(project_id)
    .bind(parent_id)
    .fetch_one(pool)
    .await?;

    let now = time::now_secs();
    let folder = Folder {
        id: uuid_utils::generate_id(),
        project_id: project_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        name,
        color: color.map(str::to_string),
        sort_order,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!("INSERT INTO folders ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)", COLUMNS))
        .bind(&folder.id)
        .bind(&folder.project_id)
        .bind(&folder.parent_id)
        .bind(&folder.name)
        .bind(&folder.color)
        .bind(folder.sort_order)
        .bind(folder.created_at)
        .bind(folder.updated_at)
        .execute(pool)
        .await?;

    Ok(folder)
}

pub async fn list_folders(pool: &SqlitePool, project_id: &str) -> Result<Vec<Folder>> {
    let rows = sqlx::query_as::<_, Folder>(&format!(
        "SELECT {} FROM folders WHERE project_id = ? ORDER BY sort_order ASC, name COLLATE NOCASE ASC",
        COLUMNS
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// True when `candidate` is `folder_id` or one of its descendants
async fn is_self_or_descendant(pool: &SqlitePool, folder_id: &str, candidate: &str) -> Result<bool> {
    let found: Option<String> = sqlx::query_scalar(
        r#"
        WITH RECURSIVE subtree(id) AS (
            SELECT id FROM folders WHERE id = ?
            UNION
            SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
        )
        SELECT id FROM subtree WHERE id = ?
        "#,
    )
    .bind(folder_id)
    .bind(candidate)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Rename and/or move a folder
///
/// `parent_id` of `Some(None)` moves the folder to the project root.
pub async fn update_folder(
    pool: &SqlitePool,
    id: &str,
    name: Option<&str>,
    parent_id: Option<Option<&str>>,
) -> Result<Folder> {
    let mut folder = require_folder(pool, id).await?;

    if let Some(name) = name {
        folder.name = require_name("Folder name", name)?;
    }
    if let Some(parent) = parent_id {
        if let Some(parent) = parent {
            if is_self_or_descendant(pool, id, parent).await? {
                return Err(Error::InvalidInput(
                    "A folder cannot be moved into itself or one of its descendants".to_string(),
                ));
            }
            check_parent(pool, &folder.project_id, parent).await?;
        }
        folder.parent_id = parent.map(str::to_string);
    }
    folder.updated_at = time::now_secs();

    sqlx::query("UPDATE folders SET name = ?, parent_id = ?, updated_at = ? WHERE id = ?")
        .bind(&folder.name)
        .bind(&folder.parent_id)
        .bind(folder.updated_at)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(folder)
}

pub async fn set_folder_color(pool: &SqlitePool, id: &str, color: Option<&str>) -> Result<Folder> {
    if let Some(color) = color {
        validate_color(color)?;
    }
    let result = sqlx::query("UPDATE folders SET color = ?, updated_at = ? WHERE id = ?")
        .bind(color)
        .bind(time::now_secs())
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Folder {}", id)));
    }
    require_folder(pool, id).await
}

/// Delete a folder, moving its children and items up to its parent
pub async fn delete_folder(pool: &SqlitePool, id: &str) -> Result<Folder> {
    let folder = require_folder(pool, id).await?;
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE folders SET parent_id = ? WHERE parent_id = ?")
        .bind(&folder.parent_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    for table in [ItemType::Document.table(), ItemType::Output.table()] {
        sqlx::query(&format!("UPDATE {} SET folder_id = ? WHERE folder_id = ?", table))
            .bind(&folder.parent_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM folders WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(folder)
}

async fn item_project(pool: &SqlitePool, item_id: &str, item_type: ItemType) -> Result<String> {
    let project: Option<String> =
        sqlx::query_scalar(&format!("SELECT project_id FROM {} WHERE id = ?", item_type.table()))
            .bind(item_id)
            .fetch_optional(pool)
            .await?;
    project.ok_or_else(|| Error::NotFound(format!("{} {}", item_type, item_id)))
}

/// Place an item in a folder, or at the root with `None`; returns the owning project
pub async fn move_item_to_folder(
    pool: &SqlitePool,
    item_id: &str,
    item_type: ItemType,
    folder_id: Option<&str>,
) -> Result<String> {
    let project_id = item_project(pool, item_id, item_type).await?;
    if let Some(folder_id) = folder_id {
        check_parent(pool, &project_id, folder_id).await?;
    }

    sqlx::query(&format!(
        "UPDATE {} SET folder_id = ?, updated_at = ? WHERE id = ?",
        item_type.table()
    ))
    .bind(folder_id)
    .bind(time::now_secs())
    .bind(item_id)
    .execute(pool)
    .await?;

    Ok(project_id)
}

/// Flip the favorite flag; returns the new value and the owning project
pub async fn toggle_item_favorite(pool: &SqlitePool, item_id: &str, item_type: ItemType) -> Result<(bool, String)> {
    let project_id = item_project(pool, item_id, item_type).await?;
    let favorite: bool = sqlx::query_scalar(&format!(
        "UPDATE {} SET is_favorite = NOT is_favorite WHERE id = ? RETURNING is_favorite",
        item_type.table()
    ))
    .bind(item_id)
    .fetch_one(pool)
    .await?;
    Ok((favorite, project_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#a1B2c3").is_ok());
        assert!(validate_color("#000000").is_ok());
        assert!(validate_color("a1b2c3").is_err());
        assert!(validate_color("#abc").is_err());
        assert!(validate_color("#gggggg").is_err());
        assert!(validate_color("#a1b2c3d").is_err());
    }
}
