//! Enrichment task models and lifecycle state machine.
//!
//! A task is one orchestrated run of one-or-more enrichers against one
//! scraper's dataset: PENDING -> RUNNING -> {COMPLETED | FAILED | CANCELLED}.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enrich::EnrichmentDiff;
use crate::models::FieldMap;

/// Overall task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Status of one enricher's slot within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnricherRunState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl EnricherRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Progress sub-record for one enricher within a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnricherProgress {
    pub status: EnricherRunState,
    pub processed: usize,
    pub enriched: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl EnricherProgress {
    /// Initial sub-record for a not-yet-started enricher.
    pub fn pending(total: usize) -> Self {
        Self {
            status: EnricherRunState::Pending,
            processed: 0,
            enriched: 0,
            total,
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }
}

/// One orchestrated enrichment run.
///
/// The before-snapshot is captured once at task start and keyed by team
/// name; when two records share a name the later one wins (upstream data
/// does not guarantee name uniqueness).
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentTask {
    /// Short unique id.
    pub id: String,
    pub scraper_id: String,
    pub scraper_name: String,
    /// Requested enrichers, in execution order.
    pub enricher_ids: Vec<String>,
    pub total_teams: usize,
    pub status: TaskStatus,
    /// Per-enricher progress, keyed by enricher id.
    pub progress: HashMap<String, EnricherProgress>,
    /// Aggregate enriched count (sum across enrichers).
    pub teams_enriched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Diff baseline, captured immediately before the first enricher runs.
    #[serde(skip)]
    pub snapshot: Option<HashMap<String, FieldMap>>,
    /// Populated only on successful completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<EnrichmentDiff>,
}

impl EnrichmentTask {
    /// Create a new pending task with one pre-populated progress slot per
    /// requested enricher.
    pub fn new(
        scraper_id: impl Into<String>,
        scraper_name: impl Into<String>,
        enricher_ids: Vec<String>,
        total_teams: usize,
    ) -> Self {
        let progress = enricher_ids
            .iter()
            .map(|id| (id.clone(), EnricherProgress::pending(total_teams)))
            .collect();

        Self {
            id: short_id(),
            scraper_id: scraper_id.into(),
            scraper_name: scraper_name.into(),
            enricher_ids,
            total_teams,
            status: TaskStatus::Pending,
            progress,
            teams_enriched: 0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            snapshot: None,
            diff: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// PENDING -> RUNNING, stamping the start time.
    pub fn mark_running(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// RUNNING -> COMPLETED (no error) or FAILED (error given).
    pub fn mark_completed(&mut self, error: Option<String>) {
        self.status = if error.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    /// Any non-terminal state -> CANCELLED.
    pub fn mark_cancelled(&mut self) {
        if !self.is_terminal() {
            self.status = TaskStatus::Cancelled;
            self.completed_at = Some(Utc::now());
        }
    }

    /// Recompute the aggregate enriched count from the sub-records.
    pub fn recompute_enriched(&mut self) {
        self.teams_enriched = self.progress.values().map(|p| p.enriched).sum();
    }

    /// Mutable access to one enricher's progress slot.
    pub fn progress_mut(&mut self, enricher_id: &str) -> Option<&mut EnricherProgress> {
        self.progress.get_mut(enricher_id)
    }
}

/// Short unique id for tasks (8 hex chars is plenty for an in-memory set).
fn short_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
