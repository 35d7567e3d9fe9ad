//! Scraper endpoints: listing, triggering runs, and serving datasets.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::ApiError;
use crate::scrapers::{self, ScrapeStatus, ScraperState};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct ScraperInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source_url: String,
    #[serde(flatten)]
    pub state: ScraperState,
}

/// List all scrapers with their persisted run state.
pub async fn list_scrapers(State(state): State<AppState>) -> impl IntoResponse {
    let states = state.store.load_scraper_state();
    let infos: Vec<ScraperInfo> = scrapers::all_scrapers()
        .iter()
        .map(|scraper| ScraperInfo {
            id: scraper.id().to_string(),
            name: scraper.name().to_string(),
            description: scraper.description().to_string(),
            source_url: scraper.source_url().to_string(),
            state: states.get(scraper.id()).cloned().unwrap_or_default(),
        })
        .collect();
    Json(infos)
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub message: String,
}

/// Trigger a scraper run in the background.
pub async fn run_scraper(
    State(state): State<AppState>,
    Path(scraper_id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    let scraper = scrapers::find_scraper(&scraper_id)
        .ok_or_else(|| ApiError::not_found(format!("unknown scraper: {scraper_id}")))?;

    let states = state.store.load_scraper_state();
    if states.get(&scraper_id).map(|s| s.status) == Some(ScrapeStatus::Running) {
        return Err(ApiError::conflict(format!(
            "scraper '{scraper_id}' is already running"
        )));
    }

    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        scrapers::run_scraper(&store, scraper.as_ref()).await;
    });

    Ok(Json(RunResponse {
        success: true,
        message: format!("Scraper '{scraper_id}' started successfully"),
    }))
}

/// Serve the latest dataset for a scraper (empty payload when none yet).
pub async fn scraper_data(
    State(state): State<AppState>,
    Path(scraper_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    scrapers::find_scraper(&scraper_id)
        .ok_or_else(|| ApiError::not_found(format!("unknown scraper: {scraper_id}")))?;

    let body = match state.store.load_dataset(&scraper_id) {
        Ok(dataset) => serde_json::json!({
            "scraper_id": dataset.scraper_id,
            "count": dataset.teams.len(),
            "last_updated": dataset.updated_at,
            "teams": dataset.teams,
        }),
        Err(_) => serde_json::json!({
            "scraper_id": scraper_id,
            "count": 0,
            "last_updated": null,
            "teams": [],
        }),
    };
    Ok(Json(body))
}
