//! Model listing

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use pmide_common::pricing::Provider;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::providers::client_for;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    #[serde(default)]
    pub api_key: String,
    /// `openai` (default) or `anthropic`
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// GET /models?api_key=&provider=
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> ApiResult<Json<ModelsResponse>> {
    let provider = match query.provider.as_deref() {
        Some(p) if !p.trim().is_empty() => p.parse::<Provider>()?,
        _ => Provider::OpenAi,
    };
    // The Anthropic list is static and needs no key
    if provider == Provider::OpenAi && query.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest("api_key is required".to_string()));
    }

    let client = client_for(provider, state.http.clone(), &state.config, &query.api_key);
    let models = client.list_models().await?;
    info!("Returning {} {} models", models.len(), provider);

    Ok(Json(ModelsResponse { models }))
}

pub fn model_routes() -> Router<AppState> {
    Router::new().route("/models", get(list_models))
}
