//! Enricher discovery endpoints.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use super::ApiError;
use crate::server::AppState;

/// List all registered enrichers with metadata and availability.
pub async fn list_enrichers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list_all())
}

/// Get one enricher's metadata.
pub async fn get_enricher(
    State(state): State<AppState>,
    Path(enricher_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registry
        .list_all()
        .into_iter()
        .find(|info| info.id == enricher_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("unknown enricher: {enricher_id}")))
}
