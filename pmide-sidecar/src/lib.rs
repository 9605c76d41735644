//! pmide-sidecar library interface
//!
//! LLM proxy for the PM IDE: normalizes Anthropic and OpenAI chat into one
//! SSE event stream with token and cost accounting, fetches context
//! documents, and serves framework definitions.

pub mod api;
pub mod documents;
pub mod error;
pub mod framework_loader;
pub mod providers;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{DateTime, Utc};
use pmide_common::config::SidecarConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::framework_loader::FrameworkLoader;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared client for provider and document requests
    pub http: reqwest::Client,
    pub config: Arc<SidecarConfig>,
    pub frameworks: Arc<FrameworkLoader>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: SidecarConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let frameworks = FrameworkLoader::new(config.frameworks_dir.clone());

        Ok(Self {
            http,
            config: Arc::new(config),
            frameworks: Arc::new(frameworks),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::model_routes())
        .merge(api::chat_routes())
        .merge(api::document_routes())
        .merge(api::framework_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
