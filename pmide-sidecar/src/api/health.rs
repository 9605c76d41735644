//! Liveness endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub status: String,
    pub service: String,
    pub version: String,
    pub git_hash: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(ServiceInfo {
        status: "ok".to_string(),
        service: "PM IDE Sidecar".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
}
