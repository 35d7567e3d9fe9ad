//! Valuation enricher.
//!
//! Scrapes Forbes team pages for franchise value, annual revenue, and
//! average ticket price. Forbes only tracks the major professional
//! leagues; minor-league teams are skipped outright. Monetary values are
//! stored in millions of dollars.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use crate::enrich::enrichers::BROWSER_USER_AGENT;
use crate::enrich::{EnrichOutcome, Enricher, EnricherConfig};
use crate::models::TeamRecord;
use crate::utils::html_to_text;

const FORBES_BASE_URL: &str = "https://www.forbes.com/teams";

/// Leagues Forbes publishes team valuations for.
const FORBES_TRACKED_LEAGUES: &[&str] = &[
    "nfl",
    "national football league",
    "nba",
    "national basketball association",
    "mlb",
    "major league baseball",
    "american league",
    "national league",
    "nhl",
    "national hockey league",
    "mls",
    "major league soccer",
];

/// Convert a team name to a Forbes URL slug
/// ("Golden State Warriors" -> "golden-state-warriors").
fn team_name_to_slug(team_name: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let non_word = NON_WORD.get_or_init(|| Regex::new(r"[^\w\s-]").expect("static regex"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"[\s-]+").expect("static regex"));

    let slug = team_name.to_lowercase();
    let slug = non_word.replace_all(slug.trim(), "");
    spaces.replace_all(&slug, "-").to_string()
}

/// Whether Forbes tracks this league.
fn is_major_league(league: &str) -> bool {
    let league = league.to_lowercase();
    FORBES_TRACKED_LEAGUES
        .iter()
        .any(|tracked| league.contains(tracked))
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ForbesFigures {
    franchise_value_millions: Option<f64>,
    revenue_millions: Option<f64>,
    avg_ticket_price: Option<f64>,
}

fn unit_to_millions(amount: f64, unit: &str) -> f64 {
    match unit {
        "B" | "b" => amount * 1000.0,
        "K" | "k" => amount / 1000.0,
        _ => amount,
    }
}

/// Extract valuation figures from the visible text of a Forbes team page.
///
/// Forbes renders "Team Value 1 $11B Calculated October 2025", "Revenue 2
/// <footnote> $880M", and "Average Ticket Price $285" in its stats blocks.
fn parse_forbes_text(text: &str) -> ForbesFigures {
    static VALUE_CALCULATED: OnceLock<Regex> = OnceLock::new();
    static TEAM_VALUE: OnceLock<Regex> = OnceLock::new();
    static REVENUE: OnceLock<Regex> = OnceLock::new();
    static TICKET: OnceLock<Regex> = OnceLock::new();

    let value_calculated = VALUE_CALCULATED.get_or_init(|| {
        Regex::new(r"\$(\d+(?:\.\d+)?)\s*([BMKbmk])\s*[Cc]alculated").expect("static regex")
    });
    let team_value = TEAM_VALUE.get_or_init(|| {
        Regex::new(r"(?i)Team\s+Value[^$]*?\$(\d+(?:\.\d+)?)\s*([BMK]?)").expect("static regex")
    });
    let revenue = REVENUE.get_or_init(|| {
        Regex::new(r"(?i)Revenue.*?\$(\d+(?:\.\d+)?)\s*([BMK])").expect("static regex")
    });
    let ticket = TICKET.get_or_init(|| {
        Regex::new(r"(?i)Average\s+Ticket\s+Price\s*\$(\d+(?:\.\d+)?)").expect("static regex")
    });

    let mut figures = ForbesFigures::default();

    let parse_capture = |captures: &regex::Captures<'_>| -> Option<f64> {
        let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
        let unit = captures.get(2).map(|m| m.as_str()).unwrap_or("M");
        let unit = if unit.is_empty() { "M" } else { unit };
        Some(unit_to_millions(amount, unit))
    };

    if let Some(captures) = value_calculated.captures(text) {
        figures.franchise_value_millions = parse_capture(&captures);
    }
    if figures.franchise_value_millions.is_none() {
        if let Some(captures) = team_value.captures(text) {
            figures.franchise_value_millions = parse_capture(&captures);
        }
    }
    if let Some(captures) = revenue.captures(text) {
        figures.revenue_millions = parse_capture(&captures);
    }
    if let Some(captures) = ticket.captures(text) {
        figures.avg_ticket_price = captures
            .get(1)
            .and_then(|m| m.as_str().parse::<f64>().ok());
    }

    figures
}

/// Scrapes Forbes team pages for valuation data.
pub struct ValuationEnricher {
    config: EnricherConfig,
    client: RwLock<Option<Client>>,
    /// slug -> parsed figures (None = page not found), shared per run.
    cache: RwLock<HashMap<String, Option<ForbesFigures>>>,
}

impl ValuationEnricher {
    pub fn new(config: EnricherConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn client(&self) -> Option<Client> {
        self.client.read().ok().and_then(|guard| guard.clone())
    }

    async fn forbes_figures(&self, team_name: &str) -> Result<Option<ForbesFigures>> {
        let slug = team_name_to_slug(team_name);
        if let Some(cached) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&slug).cloned())
        {
            return Ok(cached);
        }

        let Some(client) = self.client() else {
            return Ok(None);
        };

        let url = format!("{FORBES_BASE_URL}/{slug}/");
        let response = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Forbes request failed for {slug}"))?;

        let figures = if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(slug, "no Forbes page");
            None
        } else {
            let html = response
                .error_for_status()
                .with_context(|| format!("Forbes error status for {slug}"))?
                .text()
                .await?;
            Some(parse_forbes_text(&html_to_text(&html)))
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(slug, figures.clone());
        }
        Ok(figures)
    }
}

#[async_trait]
impl Enricher for ValuationEnricher {
    fn id(&self) -> &'static str {
        "valuation"
    }

    fn name(&self) -> &'static str {
        "Valuation Enricher"
    }

    fn description(&self) -> &'static str {
        "Scrapes Forbes team pages for franchise valuations, revenue, and ticket prices"
    }

    fn fields_added(&self) -> &'static [&'static str] {
        &[
            "avg_ticket_price",
            "franchise_value_millions",
            "annual_revenue_millions",
        ]
    }

    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn pre_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        // Forbes requires a browser-like user agent
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(self.config.request_timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build Forbes client")?;
        if let Ok(mut guard) = self.client.write() {
            *guard = Some(client);
        }
        Ok(())
    }

    async fn post_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        if let Ok(mut guard) = self.client.write() {
            *guard = None;
        }
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
        Ok(())
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> Result<EnrichOutcome> {
        if !is_major_league(&record.league) {
            return Ok(EnrichOutcome::NoChange);
        }
        if record.franchise_value_millions.is_some()
            && record.annual_revenue_millions.is_some()
            && record.avg_ticket_price.is_some()
        {
            return Ok(EnrichOutcome::NoChange);
        }

        let Some(figures) = self.forbes_figures(&record.name).await? else {
            return Ok(EnrichOutcome::NoChange);
        };

        let mut written = Vec::new();
        if record.franchise_value_millions.is_none() {
            if let Some(value) = figures.franchise_value_millions {
                record.franchise_value_millions = Some(value);
                written.push("franchise_value_millions".to_string());
            }
        }
        if record.annual_revenue_millions.is_none() {
            if let Some(revenue) = figures.revenue_millions {
                record.annual_revenue_millions = Some(revenue);
                written.push("annual_revenue_millions".to_string());
            }
        }
        if record.avg_ticket_price.is_none() {
            if let Some(price) = figures.avg_ticket_price {
                record.avg_ticket_price = Some(price);
                written.push("avg_ticket_price".to_string());
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
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(team_name_to_slug("Golden State Warriors"), "golden-state-warriors");
        assert_eq!(team_name_to_slug("St. Louis Cardinals"), "st-louis-cardinals");
        assert_eq!(team_name_to_slug("  Los  Angeles   Lakers "), "los-angeles-lakers");
    }

    #[test]
    fn test_major_league_gate() {
        assert!(is_major_league("NFL"));
        assert!(is_major_league("Major League Baseball — American League"));
        assert!(!is_major_league("Triple-A — International League"));
        assert!(!is_major_league("ECHL"));
    }

    #[test]
    fn test_parse_forbes_text_full() {
        let text = "Team Value 1 $11B Calculated October 2025 Revenue 2 \
                    Net of stadium revenues used for debt payments $880M \
                    Average Ticket Price $285 Metro Area Population 7.6M";
        let figures = parse_forbes_text(text);
        assert_eq!(figures.franchise_value_millions, Some(11_000.0));
        assert_eq!(figures.revenue_millions, Some(880.0));
        assert_eq!(figures.avg_ticket_price, Some(285.0));
    }

    #[test]
    fn test_parse_forbes_text_fallback_value() {
        let text = "Team Value is estimated at $950M this year";
        let figures = parse_forbes_text(text);
        assert_eq!(figures.franchise_value_millions, Some(950.0));
        assert_eq!(figures.revenue_millions, None);
    }

    #[test]
    fn test_parse_forbes_text_fractional_billions() {
        let text = "$5.5B Calculated December 2024 Revenue $1.2B";
        let figures = parse_forbes_text(text);
        assert_eq!(figures.franchise_value_millions, Some(5_500.0));
        assert_eq!(figures.revenue_millions, Some(1_200.0));
    }

    #[test]
    fn test_parse_forbes_text_empty() {
        assert_eq!(parse_forbes_text("nothing here"), ForbesFigures::default());
    }

    #[tokio::test]
    async fn test_minor_league_skipped() {
        let enricher = ValuationEnricher::new(EnricherConfig::default());
        let mut record = TeamRecord {
            name: "Tacoma Rainiers".to_string(),
            league: "Triple-A — Pacific Coast League".to_string(),
            ..Default::default()
        };
        let outcome = enricher.enrich_one(&mut record).await.unwrap();
        assert_eq!(outcome, EnrichOutcome::NoChange);
        assert_eq!(record.franchise_value_millions, None);
    }
}
