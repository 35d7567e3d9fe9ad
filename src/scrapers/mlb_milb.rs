//! MLB + MiLB teams scraper backed by the MLB StatsAPI.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::Scraper;
use crate::models::TeamRecord;

const MLB_STATSAPI_TEAMS_URL: &str = "https://statsapi.mlb.com/api/v1/teams";

/// Sport IDs: MLB(1), AAA(11), AA(12), High-A(13), A(14), Rookie(16).
const SPORT_IDS: &[u32] = &[1, 11, 12, 13, 14, 16];

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Vec<ApiTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTeam {
    #[serde(default)]
    name: String,
    #[serde(default)]
    location_name: Option<String>,
    #[serde(default)]
    sport: Option<Named>,
    #[serde(default)]
    league: Option<Named>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
}

/// Fetches team data from the MLB StatsAPI, covering MLB and all
/// affiliated minor league levels.
pub struct MlbMilbScraper;

impl MlbMilbScraper {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    fn team_to_record(team: ApiTeam) -> TeamRecord {
        let region = team.location_name.unwrap_or_default();
        let sport_name = team.sport.as_ref().map(|s| s.name.clone()).unwrap_or_default();
        let sport_id = team.sport.as_ref().map(|s| s.id).unwrap_or(0);
        let league_name = team.league.map(|l| l.name).unwrap_or_default();

        let league = if league_name.is_empty() {
            sport_name.clone()
        } else {
            format!("{sport_name} — {league_name}")
        };

        let target_demographic = if region.is_empty() {
            "Baseball fans".to_string()
        } else {
            format!("Local baseball fans and families in/around {region}")
        };

        let official_url = team
            .link
            .filter(|link| !link.is_empty())
            .map(|link| format!("https://statsapi.mlb.com{link}"))
            .unwrap_or_default();

        TeamRecord {
            name: team.name,
            region,
            league,
            target_demographic,
            official_url,
            category: if sport_id == 1 { "MLB" } else { "MiLB" }.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Scraper for MlbMilbScraper {
    fn id(&self) -> &'static str {
        "mlb_milb"
    }

    fn name(&self) -> &'static str {
        "MLB & MiLB Teams"
    }

    fn description(&self) -> &'static str {
        "Fetches team data from MLB StatsAPI including MLB and all affiliated minor league teams."
    }

    fn source_url(&self) -> &'static str {
        MLB_STATSAPI_TEAMS_URL
    }

    async fn scrape(&self) -> Result<Vec<TeamRecord>> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build StatsAPI client")?;

        let mut records = Vec::new();
        for sport_id in SPORT_IDS {
            let response = client
                .get(MLB_STATSAPI_TEAMS_URL)
                .query(&[("sportId", sport_id)])
                .send()
                .await;

            let body: TeamsResponse = match response {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => response
                        .json()
                        .await
                        .with_context(|| format!("invalid StatsAPI body for sportId={sport_id}"))?,
                    Err(err) => {
                        warn!(sport_id, "StatsAPI error status: {err}");
                        continue;
                    }
                },
                Err(err) => {
                    warn!(sport_id, "StatsAPI request failed: {err}");
                    continue;
                }
            };

            records.extend(
                body.teams
                    .into_iter()
                    .filter(|team| team.active == Some(true))
                    .map(Self::team_to_record),
            );
        }

        if records.is_empty() {
            bail!("StatsAPI returned no teams for any sport id");
        }

        records.sort_by(|a, b| {
            (&a.category, &a.league, &a.region, &a.name).cmp(&(
                &b.category,
                &b.league,
                &b.region,
                &b.name,
            ))
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_to_record_mlb() {
        let team = ApiTeam {
            name: "Seattle Mariners".to_string(),
            location_name: Some("Seattle".to_string()),
            sport: Some(Named {
                id: 1,
                name: "Major League Baseball".to_string(),
            }),
            league: Some(Named {
                id: 103,
                name: "American League".to_string(),
            }),
            link: Some("/api/v1/teams/136".to_string()),
            active: Some(true),
        };

        let record = MlbMilbScraper::team_to_record(team);
        assert_eq!(record.name, "Seattle Mariners");
        assert_eq!(record.region, "Seattle");
        assert_eq!(record.category, "MLB");
        assert_eq!(record.league, "Major League Baseball — American League");
        assert_eq!(record.official_url, "https://statsapi.mlb.com/api/v1/teams/136");
        assert!(record.target_demographic.contains("Seattle"));
    }

    #[test]
    fn test_team_to_record_milb_missing_fields() {
        let team = ApiTeam {
            name: "Tacoma Rainiers".to_string(),
            location_name: None,
            sport: Some(Named {
                id: 11,
                name: "Triple-A".to_string(),
            }),
            league: None,
            link: None,
            active: Some(true),
        };

        let record = MlbMilbScraper::team_to_record(team);
        assert_eq!(record.category, "MiLB");
        assert_eq!(record.league, "Triple-A");
        assert_eq!(record.official_url, "");
        assert_eq!(record.target_demographic, "Baseball fans");
    }

    #[test]
    fn test_teams_response_tolerates_missing_keys() {
        let body = r#"{"teams": [{"name": "Ghost Team"}]}"#;
        let parsed: TeamsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.teams.len(), 1);
        assert_eq!(parsed.teams[0].active, None);
    }
}
