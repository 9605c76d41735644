//! Project endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use pmide_common::events::{ChangeKind, PmEvent};
use pmide_common::time;
use serde::Deserialize;
use tracing::info;

use super::Ack;
use crate::db::projects;
use crate::models::Project;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn emit(state: &AppState, project_id: &str, change: ChangeKind) {
    state.event_bus.emit_lossy(PmEvent::ProjectChanged {
        project_id: project_id.to_string(),
        change,
        timestamp: time::now(),
    });
}

/// GET /api/projects
pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(projects::list_projects(&state.db).await?))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    let project = projects::create_project(&state.db, &req.name, req.description.as_deref()).await?;
    info!("Created project {} ({})", project.name, project.id);
    emit(&state, &project.id, ChangeKind::Created);
    Ok(Json(project))
}

/// GET /api/projects/:id
pub async fn get_project(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Project>> {
    projects::get_project(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Project {}", id)))
}

/// PUT /api/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    let project = projects::update_project(&state.db, &id, &req.name, req.description.as_deref()).await?;
    emit(&state, &id, ChangeKind::Updated);
    Ok(Json(project))
}

/// DELETE /api/projects/:id
pub async fn delete_project(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Ack>> {
    projects::delete_project(&state.db, &id).await?;
    info!("Deleted project {}", id);
    emit(&state, &id, ChangeKind::Deleted);
    Ok(Ack::ok())
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}
