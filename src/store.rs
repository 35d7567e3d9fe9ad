//! JSON-file persistence for team datasets and scraper run state.
//!
//! One dataset file per scraper under the data directory, plus a single
//! `scraper_state.json` tracking run statistics across restarts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TeamRecord;
use crate::scrapers::ScraperState;

/// Errors from dataset persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no dataset for scraper '{0}'; run the scraper first")]
    DatasetNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dataset file: {0}")]
    Format(#[from] serde_json::Error),
}

/// On-disk dataset wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDataset {
    pub scraper_id: String,
    pub updated_at: DateTime<Utc>,
    pub teams: Vec<TeamRecord>,
}

/// Summary of one stored dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub scraper_id: String,
    pub teams_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// File-backed store for team datasets.
pub struct TeamStore {
    data_dir: PathBuf,
}

impl TeamStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn dataset_path(&self, scraper_id: &str) -> PathBuf {
        self.data_dir.join(format!("{scraper_id}_teams.json"))
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join("scraper_state.json")
    }

    /// Whether a dataset exists for the given scraper.
    pub fn dataset_exists(&self, scraper_id: &str) -> bool {
        self.dataset_path(scraper_id).is_file()
    }

    /// Load a scraper's dataset.
    pub fn load_teams(&self, scraper_id: &str) -> Result<Vec<TeamRecord>, StoreError> {
        self.load_dataset(scraper_id).map(|dataset| dataset.teams)
    }

    /// Load a scraper's dataset with metadata.
    pub fn load_dataset(&self, scraper_id: &str) -> Result<TeamDataset, StoreError> {
        let path = self.dataset_path(scraper_id);
        if !path.is_file() {
            return Err(StoreError::DatasetNotFound(scraper_id.to_string()));
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Save a scraper's dataset, stamping the update time.
    pub fn save_teams(&self, scraper_id: &str, teams: &[TeamRecord]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        let dataset = TeamDataset {
            scraper_id: scraper_id.to_string(),
            updated_at: Utc::now(),
            teams: teams.to_vec(),
        };
        let raw = serde_json::to_string_pretty(&dataset)?;
        fs::write(self.dataset_path(scraper_id), raw)?;
        Ok(())
    }

    /// Summaries for every stored dataset.
    pub fn list_datasets(&self) -> Vec<DatasetInfo> {
        let Ok(entries) = fs::read_dir(&self.data_dir) else {
            return Vec::new();
        };

        let mut datasets = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(scraper_id) = name.strip_suffix("_teams.json") else {
                continue;
            };
            if let Ok(dataset) = self.load_dataset(scraper_id) {
                datasets.push(DatasetInfo {
                    scraper_id: dataset.scraper_id,
                    teams_count: dataset.teams.len(),
                    updated_at: dataset.updated_at,
                });
            }
        }
        datasets.sort_by(|a, b| a.scraper_id.cmp(&b.scraper_id));
        datasets
    }

    /// Load the persisted scraper state map (empty on first run).
    pub fn load_scraper_state(&self) -> HashMap<String, ScraperState> {
        let Ok(raw) = fs::read_to_string(self.state_path()) else {
            return HashMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// Persist the scraper state map.
    pub fn save_scraper_state(
        &self,
        state: &HashMap<String, ScraperState>,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        let raw = serde_json::to_string_pretty(state)?;
        fs::write(self.state_path(), raw)?;
        Ok(())
    }
}
