//! Sponsor and stadium enricher.
//!
//! Stadium names and ownership come from WikiData SPARQL, batch-queried by
//! sport so one query covers every team of that sport in the run. Sponsors
//! are harvested from team partner pages, with optional LLM categorization
//! of the raw candidate names.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::enrich::enrichers::{BROWSER_USER_AGENT, WIKIDATA_USER_AGENT};
use crate::enrich::{EnrichOutcome, Enricher, EnricherConfig};
use crate::llm::{LlmClient, LlmConfig, GEMINI_API_KEY_VAR};
use crate::models::{SponsorInfo, TeamRecord};

const WIKIDATA_SPARQL_URL: &str = "https://query.wikidata.org/sparql";

/// Paths likely to host partner/sponsor listings.
const PARTNER_URL_PATHS: &[&str] = &["/sponsors", "/partners", "/corporate-partners", "/partnerships"];

/// Sport -> (WikiData team class, league keywords). Querying by sport
/// catches teams regardless of specific league membership.
const SPORT_CONFIG: &[(&str, &str, &[&str])] = &[
    ("baseball", "Q13027888", &["baseball", "mlb", "milb"]),
    ("basketball", "Q13393265", &["basketball", "nba", "g league", "gleague", "wnba"]),
    ("football", "Q17156793", &["football", "nfl"]),
    ("hockey", "Q4498974", &["hockey", "nhl", "ahl", "echl"]),
    ("soccer", "Q476028", &["soccer", "mls", "nwsl"]),
];

/// Detect the sport from a league string.
fn detect_sport(league: &str) -> Option<&'static str> {
    let league = league.to_lowercase();
    SPORT_CONFIG
        .iter()
        .find(|(_, _, keywords)| keywords.iter().any(|keyword| league.contains(keyword)))
        .map(|(sport, _, _)| *sport)
}

/// Normalize a team name for cache matching.
fn normalize_team_name(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Heuristic: a team owns its venue when the venue owner's name overlaps
/// the team name.
fn infer_ownership(team_name: &str, venue_owner: &str) -> bool {
    let team = team_name.to_lowercase();
    let owner = venue_owner.to_lowercase();
    if owner.contains(&team) {
        return true;
    }
    team.split_whitespace()
        .filter(|word| word.len() > 3)
        .any(|word| owner.contains(word))
}

#[derive(Debug, Clone, Default)]
struct StadiumFacts {
    stadium_name: Option<String>,
    owns_stadium: Option<bool>,
}

/// Pull sponsor candidate names out of a partner page: partner logos carry
/// the sponsor name in their alt text.
fn extract_sponsor_candidates(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(img) = Selector::parse("img[alt]") else {
        return Vec::new();
    };

    let mut seen = BTreeSet::new();
    for element in document.select(&img) {
        let Some(alt) = element.value().attr("alt") else {
            continue;
        };
        let alt = alt.trim();
        if alt.len() < 2 || alt.len() > 60 {
            continue;
        }
        let lowered = alt.to_lowercase();
        if lowered.contains("logo") || lowered.contains("icon") || lowered.contains("banner") {
            // "Acme logo" style alts still carry the name; strip the noise
            let cleaned = alt
                .split_whitespace()
                .filter(|word| {
                    let w = word.to_lowercase();
                    w != "logo" && w != "icon" && w != "banner"
                })
                .collect::<Vec<_>>()
                .join(" ");
            if cleaned.len() >= 2 {
                seen.insert(cleaned);
            }
            continue;
        }
        seen.insert(alt.to_string());
    }

    seen.into_iter().take(30).collect()
}

/// Parse the LLM's categorized sponsor JSON into typed entries.
fn parse_sponsor_extraction(value: &Value) -> Vec<SponsorInfo> {
    let Some(items) = value.get("sponsors").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(SponsorInfo {
                name: name.to_string(),
                category: item
                    .get("category")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                asset_type: item
                    .get("asset_type")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

/// Adds stadium ownership, stadium names, and sponsor lists.
pub struct SponsorEnricher {
    config: EnricherConfig,
    wikidata: RwLock<Option<Client>>,
    site: RwLock<Option<Client>>,
    llm: RwLock<Option<LlmClient>>,
    /// normalized team name -> stadium facts, filled once per run.
    stadium_cache: RwLock<HashMap<String, StadiumFacts>>,
}

impl SponsorEnricher {
    pub fn new(config: EnricherConfig) -> Self {
        Self {
            config,
            wikidata: RwLock::new(None),
            site: RwLock::new(None),
            llm: RwLock::new(None),
            stadium_cache: RwLock::new(HashMap::new()),
        }
    }

    fn site_client(&self) -> Option<Client> {
        self.site.read().ok().and_then(|guard| guard.clone())
    }

    fn llm_client(&self) -> Option<LlmClient> {
        self.llm.read().ok().and_then(|guard| guard.clone())
    }

    /// Batch-fetch stadium facts for every team of one sport.
    async fn fetch_sport_stadiums(&self, sport: &str, team_class: &str) -> Result<()> {
        let client = {
            let guard = self.wikidata.read().ok();
            guard.and_then(|g| g.clone())
        };
        let Some(client) = client else {
            return Ok(());
        };

        let query = format!(
            r#"SELECT DISTINCT ?team ?teamLabel ?venue ?venueLabel ?venueOwnerLabel WHERE {{
  ?team wdt:P31 wd:{team_class} .
  FILTER NOT EXISTS {{ ?team wdt:P576 ?dissolved . }}
  OPTIONAL {{
    ?team wdt:P115 ?venue .
    OPTIONAL {{ ?venue wdt:P127 ?venueOwner . }}
  }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}"#
        );

        let mut response = client
            .get(WIKIDATA_SPARQL_URL)
            .query(&[("query", query.as_str()), ("format", "json")])
            .send()
            .await
            .context("WikiData request failed")?;

        // WikiData rate limits aggressively; honor Retry-After once
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let wait = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30);
            warn!(sport, wait, "WikiData rate limited, waiting");
            tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
            response = client
                .get(WIKIDATA_SPARQL_URL)
                .query(&[("query", query.as_str()), ("format", "json")])
                .send()
                .await
                .context("WikiData retry failed")?;
        }

        let body: Value = response
            .error_for_status()
            .context("WikiData returned an error status")?
            .json()
            .await
            .context("invalid WikiData response")?;

        let bindings = body["results"]["bindings"].as_array().cloned().unwrap_or_default();
        debug!(sport, records = bindings.len(), "WikiData sport query done");

        let Ok(mut cache) = self.stadium_cache.write() else {
            return Ok(());
        };
        for binding in &bindings {
            let Some(team_label) = binding["teamLabel"]["value"].as_str() else {
                continue;
            };
            let key = normalize_team_name(team_label);
            if cache.contains_key(&key) {
                continue;
            }

            let venue = binding["venueLabel"]["value"].as_str();
            let owner = binding["venueOwnerLabel"]["value"].as_str();
            let owns_stadium = match (venue, owner) {
                (Some(_), Some(owner)) => Some(infer_ownership(team_label, owner)),
                _ => None,
            };

            cache.insert(
                key,
                StadiumFacts {
                    stadium_name: venue.map(str::to_string),
                    owns_stadium,
                },
            );
        }
        Ok(())
    }

    /// Fetch the first partner page that responds with content.
    async fn fetch_partner_page(&self, official_url: &str) -> Option<String> {
        let client = self.site_client()?;
        let base = Url::parse(official_url).ok()?;

        for path in PARTNER_URL_PATHS {
            let Ok(url) = base.join(path) else { continue };
            let Ok(response) = client.get(url.as_str()).send().await else {
                continue;
            };
            if !response.status().is_success() {
                continue;
            }
            if let Ok(html) = response.text().await {
                if !html.is_empty() {
                    return Some(html);
                }
            }
        }
        None
    }

    /// Categorize raw sponsor candidates, via the LLM when configured.
    async fn categorize_sponsors(&self, team_name: &str, candidates: &[String]) -> Vec<SponsorInfo> {
        let Some(llm) = self.llm_client() else {
            return candidates
                .iter()
                .map(|name| SponsorInfo {
                    name: name.clone(),
                    category: None,
                    asset_type: None,
                })
                .collect();
        };

        let prompt = format!(
            r#"The following names were extracted from the sponsor/partner page of the {team_name} sports team:

{candidates}

Filter out anything that is not a corporate sponsor (navigation labels, the team itself, league names), and return ONLY a JSON object:
{{"sponsors": [{{"name": "...", "category": "...", "asset_type": "..."}}]}}

Use categories like "Apparel", "Beverage", "Financial", "Automotive", "Technology", "Healthcare", "Airline" and asset types like "Official Partner", "Jersey Patch", "Naming Rights". Use null when unsure."#,
            candidates = candidates.join("\n"),
        );

        match llm.generate_json(&prompt).await {
            Ok(value) => parse_sponsor_extraction(&value),
            Err(err) => {
                warn!(team = team_name, "sponsor categorization failed: {err:#}");
                candidates
                    .iter()
                    .map(|name| SponsorInfo {
                        name: name.clone(),
                        category: None,
                        asset_type: None,
                    })
                    .collect()
            }
        }
    }
}

#[async_trait]
impl Enricher for SponsorEnricher {
    fn id(&self) -> &'static str {
        "sponsor"
    }

    fn name(&self) -> &'static str {
        "Sponsor Enricher"
    }

    fn description(&self) -> &'static str {
        "Adds stadium ownership, stadium names, and sponsor information from WikiData and team websites"
    }

    fn fields_added(&self) -> &'static [&'static str] {
        &["owns_stadium", "stadium_name", "sponsors"]
    }

    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn pre_enrich(&self, records: &[TeamRecord]) -> Result<()> {
        let wikidata = Client::builder()
            .user_agent(WIKIDATA_USER_AGENT)
            .timeout(self.config.request_timeout)
            .gzip(true)
            .build()
            .context("failed to build WikiData client")?;
        let site = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(self.config.request_timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build site client")?;

        if let Ok(mut guard) = self.wikidata.write() {
            *guard = Some(wikidata);
        }
        if let Ok(mut guard) = self.site.write() {
            *guard = Some(site);
        }
        if let Some(key) = self.config.api_key_or_env("gemini", GEMINI_API_KEY_VAR) {
            let llm = LlmClient::new(key, LlmConfig::default(), self.config.request_timeout)?;
            if let Ok(mut guard) = self.llm.write() {
                *guard = Some(llm);
            }
        }

        // One SPARQL query per sport covers every team in the run
        let sports: BTreeSet<&'static str> = records
            .iter()
            .filter_map(|record| detect_sport(&record.league))
            .collect();
        for sport in sports {
            if let Some((_, team_class, _)) =
                SPORT_CONFIG.iter().find(|(name, _, _)| *name == sport)
            {
                if let Err(err) = self.fetch_sport_stadiums(sport, team_class).await {
                    warn!(sport, "stadium prefetch failed: {err:#}");
                }
            }
        }
        Ok(())
    }

    async fn post_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        if let Ok(mut guard) = self.wikidata.write() {
            *guard = None;
        }
        if let Ok(mut guard) = self.site.write() {
            *guard = None;
        }
        if let Ok(mut guard) = self.llm.write() {
            *guard = None;
        }
        if let Ok(mut cache) = self.stadium_cache.write() {
            cache.clear();
        }
        Ok(())
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> Result<EnrichOutcome> {
        let mut written = Vec::new();

        if record.stadium_name.is_none() || record.owns_stadium.is_none() {
            let facts = self
                .stadium_cache
                .read()
                .ok()
                .and_then(|cache| cache.get(&normalize_team_name(&record.name)).cloned());
            if let Some(facts) = facts {
                if record.stadium_name.is_none() {
                    if let Some(stadium) = facts.stadium_name {
                        record.stadium_name = Some(stadium);
                        written.push("stadium_name".to_string());
                    }
                }
                if record.owns_stadium.is_none() {
                    if let Some(owns) = facts.owns_stadium {
                        record.owns_stadium = Some(owns);
                        written.push("owns_stadium".to_string());
                    }
                }
            }
        }

        if record.sponsors.is_none() && !record.official_url.is_empty() {
            if let Some(html) = self.fetch_partner_page(&record.official_url).await {
                let candidates = extract_sponsor_candidates(&html);
                let sponsors = if candidates.is_empty() {
                    Vec::new()
                } else {
                    self.categorize_sponsors(&record.name, &candidates).await
                };
                let found_any = !sponsors.is_empty();
                // An explicit empty list records "checked, nothing found"
                record.sponsors = Some(sponsors);
                if found_any {
                    written.push("sponsors".to_string());
                }
            }
        }

        if written.is_empty() {
            Ok(EnrichOutcome::NoChange)
        } else {
            Ok(EnrichOutcome::Changed(written))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_detect_sport() {
        assert_eq!(detect_sport("NFL"), Some("football"));
        assert_eq!(detect_sport("Major League Baseball"), Some("baseball"));
        assert_eq!(detect_sport("NBA G League"), Some("basketball"));
        assert_eq!(detect_sport("National Hockey League — NHL"), Some("hockey"));
        assert_eq!(detect_sport("curling"), None);
    }

    #[test]
    fn test_normalize_team_name() {
        assert_eq!(normalize_team_name("  New   York  Yankees "), "new york yankees");
    }

    #[test]
    fn test_infer_ownership() {
        assert!(infer_ownership("Dallas Cowboys", "Dallas Cowboys Football Club, Ltd."));
        assert!(infer_ownership("Green Bay Packers", "Green Bay Packers, Inc."));
        assert!(!infer_ownership("New York Jets", "State of New Jersey"));
    }

    #[test]
    fn test_extract_sponsor_candidates() {
        let html = r#"
            <div class="partners">
              <img alt="Acme Airlines" src="a.png">
              <img alt="Bolt Beverages logo" src="b.png">
              <img alt="" src="c.png">
              <img alt="x" src="d.png">
            </div>
        "#;
        let candidates = extract_sponsor_candidates(html);
        assert_eq!(
            candidates,
            vec!["Acme Airlines".to_string(), "Bolt Beverages".to_string()]
        );
    }

    #[test]
    fn test_parse_sponsor_extraction() {
        let value = json!({
            "sponsors": [
                {"name": "Acme Airlines", "category": "Airline", "asset_type": "Official Partner"},
                {"name": "", "category": null},
                {"name": "Bolt", "category": null, "asset_type": null}
            ]
        });
        let sponsors = parse_sponsor_extraction(&value);
        assert_eq!(sponsors.len(), 2);
        assert_eq!(sponsors[0].name, "Acme Airlines");
        assert_eq!(sponsors[0].category.as_deref(), Some("Airline"));
        assert_eq!(sponsors[1].category, None);
    }

    #[test]
    fn test_parse_sponsor_extraction_bad_shape() {
        assert!(parse_sponsor_extraction(&json!({"other": 1})).is_empty());
        assert!(parse_sponsor_extraction(&json!([1, 2])).is_empty());
    }
}
