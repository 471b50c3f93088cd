//! Conversion handlers
//!
//! POST /convert, POST /convert/all. Both return 202 Accepted as soon as the
//! work is accepted; outcomes arrive on the event stream.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /convert request
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub path: String,
}

/// POST /convert response
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub path: String,
    pub ticket_id: u64,
}

/// POST /convert/all response
#[derive(Debug, Serialize)]
pub struct ConvertAllResponse {
    pub batch_id: Uuid,
    /// Unsupported paths snapshotted into the batch
    pub total: usize,
}

/// POST /convert
pub async fn convert_one(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> ApiResult<(StatusCode, Json<ConvertResponse>)> {
    if request.path.is_empty() {
        return Err(ApiError::BadRequest("Path is empty".to_string()));
    }

    let pending = state.handle.submit_conversion(&request.path).await?;
    let ticket_id = pending.ticket().id;
    tracing::debug!(path = %request.path, ticket = ticket_id, "Conversion accepted via API");

    Ok((
        StatusCode::ACCEPTED,
        Json(ConvertResponse {
            path: request.path,
            ticket_id,
        }),
    ))
}

/// POST /convert/all
///
/// Snapshots the Unsupported paths; the service converts them in the background.
pub async fn convert_all(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<ConvertAllResponse>)> {
    let batch = state.handle.begin_batch().await?;
    let response = ConvertAllResponse {
        batch_id: batch.plan().batch_id,
        total: batch.plan().paths.len(),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Build conversion routes
pub fn convert_routes() -> Router<AppState> {
    Router::new()
        .route("/convert", post(convert_one))
        .route("/convert/all", post(convert_all))
}
