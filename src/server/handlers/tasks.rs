//! Enrichment task endpoints: creation, inspection, cancellation, and a
//! live SSE update stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;

use super::ApiError;
use crate::enrich::TaskError;
use crate::models::EnrichmentTask;
use crate::scrapers;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub scraper_id: String,
    pub enrichers: Vec<String>,
}

/// Create and start an enrichment task.
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Json<EnrichmentTask>, ApiError> {
    let scraper = scrapers::find_scraper(&request.scraper_id)
        .ok_or(TaskError::UnknownScraper(request.scraper_id.clone()))
        .map_err(ApiError::from)?;

    let task = Arc::clone(&state.orchestrator)
        .submit(&request.scraper_id, scraper.name(), request.enrichers)
        .map_err(ApiError::from)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    #[serde(default)]
    pub active: bool,
}

/// List tasks with aggregate counts.
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListTasksParams>,
) -> impl IntoResponse {
    Json(state.orchestrator.list_tasks(params.active))
}

/// Get one task by id (active set, then history).
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<EnrichmentTask>, ApiError> {
    state
        .orchestrator
        .get_task(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("task not found: {task_id}")))
}

/// Get a completed task's diff.
pub async fn task_diff(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let diff = state.orchestrator.get_diff(&task_id).map_err(ApiError::from)?;
    Ok(Json(diff))
}

/// Cancel a non-terminal task.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<EnrichmentTask>, ApiError> {
    let task = state.orchestrator.cancel(&task_id).map_err(ApiError::from)?;
    Ok(Json(task))
}

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

fn into_events(
    tasks: impl futures::Stream<Item = EnrichmentTask> + Send + 'static,
) -> EventStream {
    tasks
        .filter_map(|task| async move {
            Event::default()
                .event("task")
                .json_data(&task)
                .ok()
                .map(Ok::<_, Infallible>)
        })
        .boxed()
}

/// Stream task snapshots over SSE until the task reaches a terminal state.
///
/// The current snapshot is sent first, then every update; the stream ends
/// after the terminal snapshot. Keepalive comments cover idle periods.
pub async fn task_events(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Sse<EventStream>, ApiError> {
    let current = state.orchestrator.get_task(&task_id);

    let stream = match state.orchestrator.subscribe(&task_id) {
        Ok(rx) => {
            let updates = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|task| (task, rx))
            });
            into_events(stream::iter(current).chain(updates))
        }
        // Terminal task: emit the final snapshot and close
        Err(TaskError::AlreadyTerminal(_)) => into_events(stream::iter(current)),
        Err(err) => return Err(ApiError::from(err)),
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
