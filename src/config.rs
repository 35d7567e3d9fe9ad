//! Configuration management for teamscout.
//!
//! Settings load from a TOML file (explicit path, `./teamscout.toml`, or
//! the user config directory) with environment variables supplying API
//! keys; `.env` files are loaded by the binary entry point before this
//! runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::enrich::EnricherConfig;

const CONFIG_FILE_NAME: &str = "teamscout.toml";

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding datasets and scraper state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub enrichment: EnrichmentSettings,

    /// API keys by provider name ("gemini", "youtube", ...). Environment
    /// variables override per-provider at lookup time.
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerSettings::default(),
            enrichment: EnrichmentSettings::default(),
            api_keys: HashMap::new(),
        }
    }
}

/// Web server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Default knobs for enrichment runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: u64,
    /// Terminal tasks kept in history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_max_concurrent() -> usize {
    5
}
fn default_batch_size() -> usize {
    50
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_batch_delay_ms() -> u64 {
    100
}
fn default_request_timeout_s() -> u64 {
    30
}
fn default_history_limit() -> usize {
    50
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            request_timeout_s: default_request_timeout_s(),
            history_limit: default_history_limit(),
        }
    }
}

impl Settings {
    /// Load settings, searching (in order): the explicit path, the current
    /// directory, the user config directory. Missing files mean defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => {
                let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("teamscout").join("config.toml"));
                }
                paths
            }
        };

        for path in candidates {
            if path.is_file() {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                return toml::from_str(&raw)
                    .with_context(|| format!("invalid config file {}", path.display()));
            }
        }

        Ok(Self::default())
    }

    /// Build the per-run enricher configuration from these settings.
    pub fn enricher_config(&self) -> EnricherConfig {
        EnricherConfig {
            max_concurrent_requests: self.enrichment.max_concurrent_requests,
            batch_size: self.enrichment.batch_size,
            max_retries: self.enrichment.max_retries,
            retry_delay: Duration::from_millis(self.enrichment.retry_delay_ms),
            batch_delay: Duration::from_millis(self.enrichment.batch_delay_ms),
            request_timeout: Duration::from_secs(self.enrichment.request_timeout_s),
            api_keys: self.api_keys.clone(),
        }
    }
}
