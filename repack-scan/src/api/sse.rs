//! Server-Sent Events stream of repack events

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use repack_common::sse::{create_heartbeat_sse_stream, keep_alive, to_sse_event, HEARTBEAT_INTERVAL};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// GET /events
///
/// Forwards every `RepackEvent` as an SSE frame named after its type. A
/// client that falls behind the bus capacity misses the oldest events and
/// receives a `Lagged` frame with the count instead.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to repack events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => match received {
                    Ok(event) => {
                        if let Some(frame) = to_sse_event(&event) {
                            yield Ok(frame);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("SSE: Client lagged, {} events dropped", skipped);
                        yield Ok(Event::default().event("Lagged").data(skipped.to_string()));
                    }
                    Err(RecvError::Closed) => {
                        info!("SSE: Event bus closed, ending stream");
                        break;
                    }
                },
            }
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}

/// GET /events/heartbeat
pub async fn heartbeat_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    create_heartbeat_sse_stream("repack-scan")
}
