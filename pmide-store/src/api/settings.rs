//! Settings endpoints
//!
//! `GET /api/settings` never includes the API key. The plain key is only
//! served by `GET /api/settings/api-key`, which the desktop shell uses when
//! it talks to the sidecar directly.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use pmide_common::events::PmEvent;
use pmide_common::time;
use serde::Serialize;

use super::Ack;
use crate::db::settings;
use crate::models::{Settings, SettingsUpdate};
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: Option<String>,
}

fn emit(state: &AppState) {
    state.event_bus.emit_lossy(PmEvent::SettingsChanged { timestamp: time::now() });
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(settings::get_settings(&state.db, &state.secrets).await?))
}

/// PUT /api/settings (partial update)
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<Settings>> {
    let updated = settings::update_settings(&state.db, &state.secrets, &update).await?;
    emit(&state);
    Ok(Json(updated))
}

/// GET /api/settings/api-key
pub async fn get_api_key(State(state): State<AppState>) -> ApiResult<Json<ApiKeyResponse>> {
    let api_key = settings::get_decrypted_api_key(&state.db, &state.secrets).await?;
    Ok(Json(ApiKeyResponse { api_key }))
}

/// DELETE /api/settings/api-key
pub async fn delete_api_key(State(state): State<AppState>) -> ApiResult<Json<Ack>> {
    settings::delete_api_key(&state.db).await?;
    emit(&state);
    Ok(Ack::ok())
}

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/settings/api-key", get(get_api_key).delete(delete_api_key))
}
