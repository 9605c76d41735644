//! Framework catalog endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use pmide_common::frameworks::{FrameworkCategory, FrameworkDefinition};
use serde::Serialize;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct FrameworkList {
    pub frameworks: Vec<FrameworkDefinition>,
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<FrameworkCategory>,
}

/// GET /frameworks
pub async fn list_frameworks(State(state): State<AppState>) -> ApiResult<Json<FrameworkList>> {
    let frameworks = state.frameworks.all().await?;
    Ok(Json(FrameworkList { frameworks }))
}

/// GET /frameworks/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<CategoryList>> {
    let categories = state.frameworks.categories().await?;
    Ok(Json(CategoryList { categories }))
}

/// GET /frameworks/:id
pub async fn get_framework(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FrameworkDefinition>> {
    state
        .frameworks
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Framework {}", id)))
}

pub fn framework_routes() -> Router<AppState> {
    Router::new()
        .route("/frameworks", get(list_frameworks))
        .route("/frameworks/categories", get(list_categories))
        .route("/frameworks/:id", get(get_framework))
}
