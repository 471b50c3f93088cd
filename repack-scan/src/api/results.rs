//! Result log handlers
//!
//! GET /results, PUT /results/filter

use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::ResultsPage;
use crate::AppState;

/// GET /results query; without `actionable` the stored filter applies
#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub actionable: Option<bool>,
}

/// PUT /results/filter body and response
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FilterSetting {
    pub show_only_actionable: bool,
}

/// GET /results
pub async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> ApiResult<Json<ResultsPage>> {
    Ok(Json(state.handle.results(query.actionable).await?))
}

/// PUT /results/filter
pub async fn set_filter(
    State(state): State<AppState>,
    Json(setting): Json<FilterSetting>,
) -> ApiResult<Json<FilterSetting>> {
    state.handle.set_filter(setting.show_only_actionable).await?;
    Ok(Json(setting))
}

/// Build result routes
pub fn result_routes() -> Router<AppState> {
    Router::new()
        .route("/results", get(list_results))
        .route("/results/filter", put(set_filter))
}
