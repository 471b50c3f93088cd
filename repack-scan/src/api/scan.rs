//! Folder selection and scan session handlers
//!
//! POST /folder, POST /scan/start, POST /scan/cancel, GET /scan/status

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, RepackError};
use crate::services::{FolderSelector, RepackSnapshot};
use crate::AppState;

/// POST /folder request
#[derive(Debug, Deserialize)]
pub struct SelectFolderRequest {
    pub path: String,
}

/// POST /folder response
#[derive(Debug, Serialize)]
pub struct SelectFolderResponse {
    pub session_id: Uuid,
    /// Canonical folder path
    pub path: PathBuf,
}

/// POST /scan/start request; an absent path scans the selected folder
#[derive(Debug, Default, Deserialize)]
pub struct StartScanRequest {
    #[serde(default)]
    pub path: Option<String>,
}

/// POST /scan/start response
#[derive(Debug, Serialize)]
pub struct StartScanResponse {
    pub session_id: Uuid,
}

/// POST /scan/cancel response
#[derive(Debug, Serialize)]
pub struct CancelScanResponse {
    /// False when no scan was running
    pub cancel_requested: bool,
}

/// POST /folder
///
/// Validates the folder, makes it the scan root and clears the results.
pub async fn select_folder(
    State(state): State<AppState>,
    Json(request): Json<SelectFolderRequest>,
) -> ApiResult<Json<SelectFolderResponse>> {
    if request.path.trim().is_empty() {
        return Err(ApiError::BadRequest("Folder path is empty".to_string()));
    }

    let folder = FolderSelector::validate(Path::new(&request.path))?;
    let session_id = state.handle.select_folder(folder.clone()).await?;

    Ok(Json(SelectFolderResponse {
        session_id,
        path: folder,
    }))
}

/// POST /scan/start
///
/// Returns 202 Accepted once the engine is walking the folder.
pub async fn start_scan(
    State(state): State<AppState>,
    request: Option<Json<StartScanRequest>>,
) -> ApiResult<(StatusCode, Json<StartScanResponse>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    match state.handle.start_scan(request.path).await {
        Ok(session_id) => {
            tracing::info!(session_id = %session_id, "Scan started via API");
            Ok((StatusCode::ACCEPTED, Json(StartScanResponse { session_id })))
        }
        Err(e @ RepackError::EngineFailure(_)) => {
            state.record_error(e.to_string()).await;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /scan/cancel
pub async fn cancel_scan(State(state): State<AppState>) -> ApiResult<Json<CancelScanResponse>> {
    let cancel_requested = state.handle.cancel_scan().await?;
    Ok(Json(CancelScanResponse { cancel_requested }))
}

/// GET /scan/status
pub async fn scan_status(State(state): State<AppState>) -> ApiResult<Json<RepackSnapshot>> {
    Ok(Json(state.handle.snapshot().await?))
}

/// Build folder and scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/folder", post(select_folder))
        .route("/scan/start", post(start_scan))
        .route("/scan/cancel", post(cancel_scan))
        .route("/scan/status", get(scan_status))
}
