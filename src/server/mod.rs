//! Web server exposing scrapers, enrichers, and enrichment tasks.
//!
//! Thin HTTP layer over the orchestration core: validation errors map to
//! 4xx responses, everything else surfaces task/diff state verbatim.

mod handlers;
mod routes;

pub use routes::create_router;

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::enrich::{default_registry, EnricherRegistry, TaskOrchestrator};
use crate::store::TeamStore;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TeamStore>,
    pub registry: Arc<EnricherRegistry>,
    pub orchestrator: Arc<TaskOrchestrator>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let store = Arc::new(TeamStore::new(&settings.data_dir));
        let registry = Arc::new(default_registry());
        let orchestrator = Arc::new(
            TaskOrchestrator::new(
                Arc::clone(&registry),
                Arc::clone(&store),
                settings.enricher_config(),
            )
            .with_history_limit(settings.enrichment.history_limit),
        );
        Self {
            store,
            registry,
            orchestrator,
        }
    }
}

/// Bind and serve until shutdown.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let state = AppState::new(settings);
    let router = create_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server listening on http://{addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
