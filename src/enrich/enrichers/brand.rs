//! Brand alignment enricher.
//!
//! Harvests CSR/community/foundation pages from team websites and uses an
//! LLM to extract mission focus tags, named community programs, and cause
//! partnerships. Requires a configured LLM API key.

use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::enrich::enrichers::BROWSER_USER_AGENT;
use crate::enrich::{EnrichOutcome, Enricher, EnricherConfig};
use crate::llm::{LlmClient, LlmConfig, GEMINI_API_KEY_VAR};
use crate::models::TeamRecord;
use crate::utils::html_to_text;

/// Paths commonly hosting community/CSR content.
const COMMUNITY_URL_PATHS: &[&str] = &[
    "/community",
    "/community-relations",
    "/community-impact",
    "/foundation",
    "/charity",
    "/giving",
    "/philanthropy",
    "/corporate-responsibility",
    "/social-responsibility",
];

/// Standardized mission focus areas the extraction is constrained to.
const MISSION_TAGS: &[&str] = &[
    "Youth Development",
    "Health & Wellness",
    "Diversity & Inclusion",
    "Environmental Sustainability",
    "Veterans & Military",
    "Hunger Relief",
    "Education",
    "Community Development",
    "Cancer Awareness",
    "Housing & Homelessness",
];

/// Lists extracted from community page content.
#[derive(Debug, Default, PartialEq)]
struct BrandExtraction {
    mission_tags: Vec<String>,
    community_programs: Vec<String>,
    cause_partnerships: Vec<String>,
}

impl BrandExtraction {
    fn is_empty(&self) -> bool {
        self.mission_tags.is_empty()
            && self.community_programs.is_empty()
            && self.cause_partnerships.is_empty()
    }
}

/// Validate and coerce the LLM's response into typed lists. Mission tags
/// outside the standardized set are dropped.
fn parse_brand_extraction(value: &Value) -> BrandExtraction {
    fn string_list(value: &Value, key: &str) -> Vec<String> {
        value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    let mut extraction = BrandExtraction {
        mission_tags: string_list(value, "mission_tags"),
        community_programs: string_list(value, "community_programs"),
        cause_partnerships: string_list(value, "cause_partnerships"),
    };
    extraction
        .mission_tags
        .retain(|tag| MISSION_TAGS.contains(&tag.as_str()));
    extraction
}

fn extraction_prompt(team_name: &str, content: &str) -> String {
    format!(
        r#"You are analyzing the community, foundation, and CSR pages of the {team_name} sports team.

Content:
{content}

Extract and return ONLY a JSON object with three arrays:

1. "mission_tags": mission focus areas, chosen ONLY from this list: {tags}
2. "community_programs": specific named programs run by the team (actual program names)
3. "cause_partnerships": named charity partners or cause partnerships (organization names)

Return empty arrays where nothing relevant is found. No explanation, no markdown."#,
        tags = MISSION_TAGS.join(", "),
    )
}

/// Extracts brand alignment and community involvement via LLM analysis.
pub struct BrandEnricher {
    config: EnricherConfig,
    client: RwLock<Option<Client>>,
    llm: RwLock<Option<LlmClient>>,
    api_key: Option<String>,
}

impl BrandEnricher {
    pub fn new(config: EnricherConfig) -> Self {
        let api_key = config.api_key_or_env("gemini", GEMINI_API_KEY_VAR);
        Self {
            config,
            client: RwLock::new(None),
            llm: RwLock::new(None),
            api_key,
        }
    }

    fn client(&self) -> Option<Client> {
        self.client.read().ok().and_then(|guard| guard.clone())
    }

    fn llm_client(&self) -> Option<LlmClient> {
        self.llm.read().ok().and_then(|guard| guard.clone())
    }

    /// Gather text from the team's community pages, capped to keep the LLM
    /// request bounded.
    async fn collect_community_content(&self, official_url: &str) -> Option<String> {
        let client = self.client()?;
        let base = Url::parse(official_url).ok()?;

        let mut combined = String::new();
        for path in COMMUNITY_URL_PATHS {
            let Ok(url) = base.join(path) else { continue };
            let Ok(response) = client.get(url.as_str()).send().await else {
                continue;
            };
            if !response.status().is_success() {
                continue;
            }
            let Ok(html) = response.text().await else {
                continue;
            };
            let text = html_to_text(&html);
            if text.len() < 200 {
                // boilerplate 404-ish page, skip
                continue;
            }
            combined.push_str(&text);
            combined.push('\n');
            if combined.len() > 20_000 {
                break;
            }
        }

        if combined.trim().is_empty() {
            None
        } else {
            Some(combined)
        }
    }
}

#[async_trait]
impl Enricher for BrandEnricher {
    fn id(&self) -> &'static str {
        "brand"
    }

    fn name(&self) -> &'static str {
        "Brand Enricher"
    }

    fn description(&self) -> &'static str {
        "Extracts brand alignment, CSR, and community program information using LLM analysis"
    }

    fn fields_added(&self) -> &'static [&'static str] {
        &["mission_tags", "community_programs", "cause_partnerships"]
    }

    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn pre_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        let Some(key) = self.api_key.clone() else {
            anyhow::bail!("brand enricher requires an LLM API key");
        };

        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(self.config.request_timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build brand HTTP client")?;
        let llm = LlmClient::new(key, LlmConfig::default(), self.config.request_timeout)?;

        if let Ok(mut guard) = self.client.write() {
            *guard = Some(client);
        }
        if let Ok(mut guard) = self.llm.write() {
            *guard = Some(llm);
        }
        Ok(())
    }

    async fn post_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        if let Ok(mut guard) = self.client.write() {
            *guard = None;
        }
        if let Ok(mut guard) = self.llm.write() {
            *guard = None;
        }
        Ok(())
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> Result<EnrichOutcome> {
        if record.mission_tags.is_some() {
            return Ok(EnrichOutcome::NoChange);
        }
        if record.official_url.is_empty() {
            return Ok(EnrichOutcome::NoChange);
        }
        let Some(llm) = self.llm_client() else {
            return Ok(EnrichOutcome::NoChange);
        };

        let Some(content) = self.collect_community_content(&record.official_url).await else {
            debug!(team = %record.name, "no community content found");
            return Ok(EnrichOutcome::NoChange);
        };

        let prompt = extraction_prompt(&record.name, &llm.clip_content(&content));
        let extraction = match llm.generate_json(&prompt).await {
            Ok(value) => parse_brand_extraction(&value),
            Err(err) => {
                warn!(team = %record.name, "brand extraction failed: {err:#}");
                return Err(err);
            }
        };

        let found_any = !extraction.is_empty();
        // Explicit empty lists record "checked, nothing found"
        record.mission_tags = Some(extraction.mission_tags);
        record.community_programs = Some(extraction.community_programs);
        record.cause_partnerships = Some(extraction.cause_partnerships);

        if found_any {
            Ok(EnrichOutcome::changed(&[
                "mission_tags",
                "community_programs",
                "cause_partnerships",
            ]))
        } else {
            Ok(EnrichOutcome::NoChange)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_extraction_filters_unknown_tags() {
        let value = json!({
            "mission_tags": ["Education", "World Domination", "Hunger Relief"],
            "community_programs": ["HOPE Week", ""],
            "cause_partnerships": ["Make-A-Wish"]
        });
        let extraction = parse_brand_extraction(&value);
        assert_eq!(extraction.mission_tags, vec!["Education", "Hunger Relief"]);
        assert_eq!(extraction.community_programs, vec!["HOPE Week"]);
        assert_eq!(extraction.cause_partnerships, vec!["Make-A-Wish"]);
        assert!(!extraction.is_empty());
    }

    #[test]
    fn test_parse_extraction_bad_shape() {
        let extraction = parse_brand_extraction(&json!({"mission_tags": "Education"}));
        assert!(extraction.is_empty());
    }

    #[test]
    fn test_prompt_mentions_team_and_tags() {
        let prompt = extraction_prompt("Seattle Storm", "page text");
        assert!(prompt.contains("Seattle Storm"));
        assert!(prompt.contains("Youth Development"));
        assert!(prompt.contains("page text"));
    }

    #[test]
    fn test_availability_requires_key() {
        let mut config = EnricherConfig::default();
        config
            .api_keys
            .insert("gemini".to_string(), "test-key".to_string());
        assert!(BrandEnricher::new(config).is_available());
    }
}
