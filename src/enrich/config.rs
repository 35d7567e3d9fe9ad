//! Per-run enricher configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Configuration for one enricher run.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    /// Max concurrent in-flight item operations within one batch.
    pub max_concurrent_requests: usize,
    /// Items processed per concurrency wave.
    pub batch_size: usize,
    /// Total attempts per item (1 = no retry).
    pub max_retries: usize,
    /// Base retry backoff; the actual delay is linear (delay x attempt).
    pub retry_delay: Duration,
    /// Politeness pause between batches (skipped after the final batch).
    pub batch_delay: Duration,
    /// Timeout for individual outbound requests made by the enricher.
    pub request_timeout: Duration,
    /// Credential / API-key bag, keyed by provider name.
    pub api_keys: HashMap<String, String>,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            batch_size: 50,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            batch_delay: Duration::from_millis(100),
            request_timeout: Duration::from_secs(30),
            api_keys: HashMap::new(),
        }
    }
}

impl EnricherConfig {
    /// Look up an API key from the bag, falling back to an environment
    /// variable.
    pub fn api_key_or_env(&self, name: &str, env_var: &str) -> Option<String> {
        self.api_keys
            .get(name)
            .cloned()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(env_var).ok().filter(|key| !key.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EnricherConfig::default();
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_api_key_prefers_bag_over_env() {
        let mut config = EnricherConfig::default();
        config
            .api_keys
            .insert("gemini".to_string(), "from-bag".to_string());
        assert_eq!(
            config.api_key_or_env("gemini", "TEAMSCOUT_TEST_UNSET_VAR"),
            Some("from-bag".to_string())
        );
        assert_eq!(
            config.api_key_or_env("missing", "TEAMSCOUT_TEST_UNSET_VAR"),
            None
        );
    }

    #[test]
    fn test_empty_key_treated_as_absent() {
        let mut config = EnricherConfig::default();
        config.api_keys.insert("x".to_string(), String::new());
        assert_eq!(config.api_key_or_env("x", "TEAMSCOUT_TEST_UNSET_VAR"), None);
    }
}
