//! pmide-store library interface
//!
//! Local data service for the PM IDE: projects, conversations, documents,
//! outputs, folders, frameworks and prompts in SQLite, plus the streaming
//! chat relay to the sidecar.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod palette;
pub mod relay;
pub mod secrets;
pub mod transfer;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use pmide_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::secrets::SecretBox;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub secrets: Arc<SecretBox>,
    /// Client for sidecar requests
    pub http: reqwest::Client,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, secrets: SecretBox) -> Self {
        Self {
            db,
            event_bus,
            secrets: Arc::new(secrets),
            http: reqwest::Client::new(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .merge(api::project_routes())
        .merge(api::conversation_routes())
        .merge(api::usage_routes())
        .merge(api::settings_routes())
        .merge(api::document_routes())
        .merge(api::output_routes())
        .merge(api::folder_routes())
        .merge(api::framework_routes())
        .merge(api::prompt_routes())
        .merge(api::transfer_routes())
        .merge(relay::relay_routes())
        .merge(palette::palette_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
