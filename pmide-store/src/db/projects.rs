//! Project CRUD

use pmide_common::{time, uuid_utils, Error, Result};
use sqlx::SqlitePool;

use super::{non_empty, require_name};
use crate::models::Project;

const COLUMNS: &str = "id, name, description, created_at, updated_at";

pub async fn create_project(pool: &SqlitePool, name: &str, description: Option<&str>) -> Result<Project> {
    let now = time::now_secs();
    let project = Project {
        id: uuid_utils::generate_id(),
        name: require_name("Project name", name)?,
        description: non_empty(description),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO projects (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await?;

    Ok(project)
}

/// All projects, most recently updated first
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects ORDER BY updated_at DESC, rowid DESC",
        COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(projects)
}

pub async fn get_project(pool: &SqlitePool, id: &str) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(&format!("SELECT {} FROM projects WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(project)
}

pub async fn update_project(
    pool: &SqlitePool,
    id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Project> {
    let name = require_name("Project name", name)?;
    let result = sqlx::query("UPDATE projects SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(non_empty(description))
        .bind(time::now_secs())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Project {}", id)));
    }

    get_project(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Project {}", id)))
}

/// Bump `updated_at` so the project sorts first
pub async fn touch_project(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
        .bind(time::now_secs())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a project and everything it owns
pub async fn delete_project(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Project {}", id)));
    }
    Ok(())
}

/// NotFound unless the project exists
pub async fn require_project(pool: &SqlitePool, id: &str) -> Result<Project> {
    get_project(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Project {}", id)))
}
