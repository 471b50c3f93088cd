//! Server-Sent Events (SSE) utilities

use crate::events::RepackEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between heartbeat comments on idle streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Convert a RepackEvent into an SSE frame named after its type
///
/// Returns `None` if the event cannot be serialized.
pub fn to_sse_event(event: &RepackEvent) -> Option<Event> {
    let event_type = event.event_type();
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event_type).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
            None
        }
    }
}

/// Keep-alive settings shared by every stream
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}

/// Create a heartbeat-only SSE stream for connection status monitoring
///
/// Clients that only need to know whether the service is up connect here.
pub fn create_heartbeat_sse_stream(
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} heartbeat", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            debug!("SSE: Sending heartbeat");
            yield Ok(Event::default().comment("heartbeat"));
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}
