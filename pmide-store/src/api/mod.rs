//! HTTP API handlers for pmide-store
//!
//! JSON under `/api/...`; every successful mutation emits a [`PmEvent`] so
//! the `/events` stream can tell open windows to refresh.

pub mod conversations;
pub mod documents;
pub mod folders;
pub mod frameworks;
pub mod health;
pub mod outputs;
pub mod projects;
pub mod prompts;
pub mod settings;
pub mod sse;
pub mod transfer;
pub mod usage;

pub use conversations::conversation_routes;
pub use documents::document_routes;
pub use folders::folder_routes;
pub use frameworks::framework_routes;
pub use health::health_routes;
pub use outputs::output_routes;
pub use projects::project_routes;
pub use prompts::prompt_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
pub use transfer::transfer_routes;
pub use usage::usage_routes;

use pmide_common::events::{ChangeKind, ItemKind, PmEvent};
use pmide_common::time;
use serde::Serialize;

use crate::AppState;

/// Body of endpoints that only acknowledge
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> axum::Json<Self> {
        axum::Json(Self { success: true })
    }
}

pub(crate) fn emit_items_changed(
    state: &AppState,
    project_id: &str,
    kind: ItemKind,
    item_id: &str,
    change: ChangeKind,
) {
    state.event_bus.emit_lossy(PmEvent::ItemsChanged {
        project_id: project_id.to_string(),
        kind,
        item_id: item_id.to_string(),
        change,
        timestamp: time::now(),
    });
}

pub(crate) fn emit_frameworks_changed(state: &AppState, framework_id: Option<&str>) {
    state.event_bus.emit_lossy(PmEvent::FrameworksChanged {
        framework_id: framework_id.map(str::to_string),
        timestamp: time::now(),
    });
}

pub(crate) fn emit_prompts_changed(state: &AppState, prompt_id: Option<&str>) {
    state.event_bus.emit_lossy(PmEvent::PromptsChanged {
        prompt_id: prompt_id.map(str::to_string),
        timestamp: time::now(),
    });
}
