//! Document parsing endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::documents::{self, ParseRequest, ParsedDocument};
use crate::{ApiResult, AppState};

/// POST /documents/parse
pub async fn parse_document(
    State(state): State<AppState>,
    Json(req): Json<ParseRequest>,
) -> ApiResult<Json<ParsedDocument>> {
    Ok(Json(documents::parse_document(&state.http, &req).await?))
}

pub fn document_routes() -> Router<AppState> {
    Router::new().route("/documents/parse", post(parse_document))
}
