//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Scrapers
        .route("/api/scrapers", get(handlers::list_scrapers))
        .route("/api/scrapers/:scraper_id/run", post(handlers::run_scraper))
        .route("/api/scrapers/:scraper_id/data", get(handlers::scraper_data))
        // Enrichers
        .route("/api/enrichers", get(handlers::list_enrichers))
        .route("/api/enrichers/:enricher_id", get(handlers::get_enricher))
        // Enrichment tasks
        .route("/api/enrich/tasks", post(handlers::create_task))
        .route("/api/enrich/tasks", get(handlers::list_tasks))
        .route("/api/enrich/tasks/:task_id", get(handlers::get_task))
        .route("/api/enrich/tasks/:task_id/diff", get(handlers::task_diff))
        .route("/api/enrich/tasks/:task_id/cancel", post(handlers::cancel_task))
        .route("/api/enrich/tasks/:task_id/events", get(handlers::task_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
