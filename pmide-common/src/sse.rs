//! Server-Sent Events (SSE) utilities
//!
//! Shared server-side SSE helpers for the PM IDE services. Decoding of
//! incoming streams lives in [`crate::sse_parser`].

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::chat::ChatEvent;
use crate::events::EventBus;

/// Heartbeat period for long-lived streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}

/// Forward every [`crate::events::PmEvent`] on the bus to an SSE client
///
/// Each event is sent with its type as the SSE event name and the JSON
/// encoding as data. A lagging client is told how many events it missed.
pub fn create_event_bus_sse_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: Broadcasting {}", event_type);
                            yield Ok(Event::default().event(event_type).data(json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("SSE: {} client lagged, {} events dropped", service_name, missed);
                    yield Ok(Event::default().event("Lagged").data(missed.to_string()));
                }
                Err(RecvError::Closed) => {
                    info!("SSE: {} event bus closed", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}

/// Encode a chat event as an unnamed SSE `data:` frame
pub fn chat_event_frame(event: &ChatEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            warn!("SSE: Failed to serialize chat event: {}", e);
            Event::default().data(r#"{"type":"error","error":"serialization failure"}"#)
        }
    }
}

/// Wrap a finite chat-event stream as an SSE response
pub fn chat_event_sse<S>(events: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = ChatEvent> + Send + 'static,
{
    use futures::StreamExt;
    Sse::new(events.map(|event| Ok(chat_event_frame(&event)))).keep_alive(keep_alive())
}
