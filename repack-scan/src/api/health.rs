//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the service task is gone
    pub status: String,
    /// Module name ("repack-scan")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    // Session errors first, then anything a handler recorded
    let (status, session_error) = match state.handle.snapshot().await {
        Ok(snapshot) => ("ok", snapshot.session.last_error),
        Err(e) => ("degraded", Some(e.to_string())),
    };
    let last_error = match session_error {
        Some(error) => Some(error),
        None => state.last_error.read().await.clone(),
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "repack-scan".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
