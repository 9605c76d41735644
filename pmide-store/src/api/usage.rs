//! Token usage endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use pmide_common::events::PmEvent;
use pmide_common::time;
use serde::Deserialize;

use crate::db::usage;
use crate::models::{TokenUsageRecord, UsageSummary};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordUsageRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
}

/// GET /api/usage?start=YYYY-MM-DD&end=YYYY-MM-DD
///
/// Without both bounds, every record is returned.
pub async fn get_usage(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<Vec<TokenUsageRecord>>> {
    let records = match (range.start.as_deref(), range.end.as_deref()) {
        (Some(start), Some(end)) => usage::get_token_usage_by_date_range(&state.db, start, end).await?,
        (None, None) => usage::get_all_token_usage(&state.db).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "Both start and end are required for a date range".to_string(),
            ))
        }
    };
    Ok(Json(records))
}

/// POST /api/usage
pub async fn record_usage(
    State(state): State<AppState>,
    Json(req): Json<RecordUsageRequest>,
) -> ApiResult<Json<TokenUsageRecord>> {
    if req.input_tokens < 0 || req.output_tokens < 0 || req.cost < 0.0 {
        return Err(ApiError::BadRequest("Usage values cannot be negative".to_string()));
    }
    let record = usage::record_token_usage(
        &state.db,
        req.conversation_id.as_deref(),
        &req.model,
        req.input_tokens,
        req.output_tokens,
        req.cost,
    )
    .await?;
    state.event_bus.emit_lossy(PmEvent::TokenUsageRecorded {
        conversation_id: record.conversation_id.clone(),
        model: record.model.clone(),
        input_tokens: record.input_tokens,
        output_tokens: record.output_tokens,
        cost: record.cost,
        timestamp: time::now(),
    });
    Ok(Json(record))
}

/// GET /api/usage/summary?start=&end=
pub async fn get_summary(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<UsageSummary>> {
    Ok(Json(
        usage::usage_summary(&state.db, range.start.as_deref(), range.end.as_deref()).await?,
    ))
}

pub fn usage_routes() -> Router<AppState> {
    Router::new()
        .route("/api/usage", get(get_usage).post(record_usage))
        .route("/api/usage/summary", get(get_summary))
}
