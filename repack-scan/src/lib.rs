//! repack-scan library interface
//!
//! Exposes the engines, the repack service and the HTTP router so the binary
//! and the integration tests share one construction path.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, RepackError};

use axum::Router;
use chrono::{DateTime, Utc};
use repack_common::events::EventBus;
use services::RepackHandle;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Client of the repack service task
    pub handle: RepackHandle,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(handle: RepackHandle, event_bus: EventBus) -> Self {
        Self {
            handle,
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::scan_routes())
        .merge(api::result_routes())
        .merge(api::convert_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .route("/events/heartbeat", get(api::heartbeat_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
