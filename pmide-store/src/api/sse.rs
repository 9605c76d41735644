//! GET /events: store change notifications

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// Streams every [`pmide_common::events::PmEvent`] with a 15 s heartbeat
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    pmide_common::sse::create_event_bus_sse_stream(&state.event_bus, "pmide-store")
}
