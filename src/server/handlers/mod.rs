//! HTTP endpoint handlers.

mod enrichers;
mod scrapers;
mod tasks;

pub use enrichers::{get_enricher, list_enrichers};
pub use scrapers::{list_scrapers, run_scraper, scraper_data};
pub use tasks::{cancel_task, create_task, get_task, list_tasks, task_diff, task_events};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::enrich::TaskError;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Error envelope translated to an HTTP status + JSON body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        let status = match err {
            TaskError::UnknownScraper(_) | TaskError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskError::NoEnrichers
            | TaskError::UnknownEnricher(_)
            | TaskError::MissingDataset(_) => StatusCode::BAD_REQUEST,
            TaskError::AlreadyRunning(_)
            | TaskError::AlreadyTerminal(_)
            | TaskError::DiffUnavailable(_, _) => StatusCode::CONFLICT,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}
