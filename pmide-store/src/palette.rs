//! Command palette
//!
//! One ranked list across commands, projects, frameworks, prompts and the
//! current project's items.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use pmide_common::fuzzy::rank_fields;
use serde::{Deserialize, Serialize};

use crate::db::{frameworks, projects, prompts, search};
use crate::{ApiResult, AppState};

pub const MAX_PALETTE_RESULTS: usize = 30;

/// (id, title, hint)
const COMMANDS: &[(&str, &str, &str)] = &[
    ("new-project", "New Project", "Create a project"),
    ("new-conversation", "New Conversation", "Start a chat in the current project"),
    ("new-document", "Add Context Document", "Paste text or a URL as context"),
    ("new-folder", "New Folder", "Organize documents and outputs"),
    ("open-frameworks", "Browse Frameworks", "PM frameworks by category"),
    ("open-prompts", "Prompt Library", "Saved prompt templates"),
    ("import-frameworks", "Import Frameworks", "Load a framework bundle"),
    ("export-frameworks", "Export Frameworks", "Save frameworks to a bundle"),
    ("import-prompts", "Import Prompts", "Load a prompt bundle"),
    ("export-prompts", "Export Prompts", "Save prompts to a bundle"),
    ("open-usage", "Token Usage", "Spend by day and model"),
    ("open-settings", "Settings", "API key, model and theme"),
    ("toggle-theme", "Toggle Theme", "Switch light and dark"),
];

#[derive(Debug, Deserialize)]
pub struct PaletteQuery {
    #[serde(default)]
    pub q: String,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    /// command, project, framework, prompt, document, output, folder or conversation
    pub kind: String,
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub score: i64,
}

impl PaletteEntry {
    fn new(kind: &str, id: &str, title: &str, subtitle: Option<&str>) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.to_string(),
            title: title.to_string(),
            subtitle: subtitle.filter(|s| !s.is_empty()).map(str::to_string),
            score: 0,
        }
    }
}

/// Rank every palette candidate for `query`
pub async fn palette_entries(
    state: &AppState,
    query: &str,
    project_id: Option<&str>,
) -> pmide_common::Result<Vec<PaletteEntry>> {
    let mut candidates: Vec<PaletteEntry> = COMMANDS
        .iter()
        .map(|(id, title, hint)| PaletteEntry::new("command", id, title, Some(hint)))
        .collect();

    for project in projects::list_projects(&state.db).await? {
        candidates.push(PaletteEntry::new(
            "project",
            &project.id,
            &project.name,
            project.description.as_deref(),
        ));
    }
    for def in frameworks::list_framework_defs(&state.db, None).await? {
        candidates.push(PaletteEntry::new("framework", &def.id, &def.name, Some(&def.description)));
    }
    for prompt in prompts::list_saved_prompts(&state.db, None).await? {
        candidates.push(PaletteEntry::new("prompt", &prompt.id, &prompt.name, Some(&prompt.description)));
    }

    let mut ranked: Vec<PaletteEntry> = rank_fields(query, candidates, |e| {
        vec![
            (e.title.as_str(), 1.0),
            (e.subtitle.as_deref().unwrap_or(""), 0.5),
        ]
    })
    .into_iter()
    .map(|r| PaletteEntry { score: r.score, ..r.item })
    .collect();

    // Project items are already ranked by the project search
    if let Some(project_id) = project_id {
        for hit in search::search_project_items(&state.db, project_id, query).await? {
            ranked.push(PaletteEntry {
                kind: hit.item_type,
                id: hit.id,
                title: hit.name,
                subtitle: hit.snippet,
                score: hit.score,
            });
        }
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
    }

    ranked.truncate(MAX_PALETTE_RESULTS);
    Ok(ranked)
}

/// GET /api/palette?q=&project_id=
pub async fn palette(
    State(state): State<AppState>,
    Query(params): Query<PaletteQuery>,
) -> ApiResult<Json<Vec<PaletteEntry>>> {
    let entries = palette_entries(&state, &params.q, params.project_id.as_deref()).await?;
    Ok(Json(entries))
}

pub fn palette_routes() -> Router<AppState> {
    Router::new().route("/api/palette", get(palette))
}
