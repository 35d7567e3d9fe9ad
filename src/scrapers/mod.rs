//! League scraper implementations producing team datasets.

mod mlb_milb;
mod nfl;

pub use mlb_milb::MlbMilbScraper;
pub use nfl::NflScraper;

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::TeamRecord;
use crate::store::TeamStore;

/// A league directory scraper producing a batch of team records.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Stable identifier (also the dataset key).
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn source_url(&self) -> &'static str;

    /// Fetch and parse the league directory.
    async fn scrape(&self) -> anyhow::Result<Vec<TeamRecord>>;
}

/// Current status of a scraper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Persisted run statistics for one scraper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScraperState {
    #[serde(default)]
    pub status: ScrapeStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_duration_ms: u64,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default)]
    pub successful_runs: u64,
    #[serde(default)]
    pub last_teams_count: usize,
}

/// Result of one scraper run.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub scraper_id: String,
    pub teams_count: usize,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every known scraper, as wired at process start.
pub fn all_scrapers() -> Vec<Box<dyn Scraper>> {
    vec![Box::new(MlbMilbScraper::new()), Box::new(NflScraper::new())]
}

/// Look up a scraper by id.
pub fn find_scraper(id: &str) -> Option<Box<dyn Scraper>> {
    all_scrapers().into_iter().find(|scraper| scraper.id() == id)
}

/// Run a scraper, persisting the dataset and updated run state.
pub async fn run_scraper(store: &TeamStore, scraper: &dyn Scraper) -> ScrapeOutcome {
    let started = Utc::now();
    let timer = Instant::now();
    let id = scraper.id();

    let mut states = store.load_scraper_state();
    {
        let state = states.entry(id.to_string()).or_default();
        state.status = ScrapeStatus::Running;
        state.last_run = Some(started);
        state.total_runs += 1;
    }
    let _ = store.save_scraper_state(&states);

    info!(scraper = id, "scrape started");
    let result = scraper.scrape().await;
    let duration_ms = timer.elapsed().as_millis() as u64;

    let outcome = match result {
        Ok(teams) => match store.save_teams(id, &teams) {
            Ok(()) => {
                let state = states.entry(id.to_string()).or_default();
                state.status = ScrapeStatus::Success;
                state.last_success = Some(Utc::now());
                state.last_error = None;
                state.successful_runs += 1;
                state.last_teams_count = teams.len();
                state.last_duration_ms = duration_ms;
                info!(scraper = id, teams = teams.len(), "scrape finished");
                ScrapeOutcome {
                    success: true,
                    scraper_id: id.to_string(),
                    teams_count: teams.len(),
                    duration_ms,
                    timestamp: started,
                    error: None,
                }
            }
            Err(err) => failure_outcome(&mut states, id, started, duration_ms, err.to_string()),
        },
        Err(err) => failure_outcome(&mut states, id, started, duration_ms, format!("{err:#}")),
    };

    let _ = store.save_scraper_state(&states);
    outcome
}

fn failure_outcome(
    states: &mut std::collections::HashMap<String, ScraperState>,
    id: &str,
    started: DateTime<Utc>,
    duration_ms: u64,
    error: String,
) -> ScrapeOutcome {
    error!(scraper = id, "scrape failed: {error}");
    let state = states.entry(id.to_string()).or_default();
    state.status = ScrapeStatus::Failed;
    state.last_error = Some(error.clone());
    state.last_duration_ms = duration_ms;
    ScrapeOutcome {
        success: false,
        scraper_id: id.to_string(),
        teams_count: 0,
        duration_ms,
        timestamp: started,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scrapers_have_unique_ids() {
        let scrapers = all_scrapers();
        let mut ids: Vec<&str> = scrapers.iter().map(|s| s.id()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_find_scraper() {
        assert!(find_scraper("nfl").is_some());
        assert!(find_scraper("mlb_milb").is_some());
        assert!(find_scraper("curling").is_none());
    }

    #[test]
    fn test_scraper_state_defaults() {
        let state = ScraperState::default();
        assert_eq!(state.status, ScrapeStatus::Idle);
        assert_eq!(state.total_runs, 0);
        assert_eq!(state.last_run, None);
    }
}
