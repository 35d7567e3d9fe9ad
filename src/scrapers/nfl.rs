//! NFL teams scraper for the NFL.com directory.
//!
//! The live page is parsed by locating the "View Full Site" links each team
//! card carries and walking nearby headings for the team name. When the
//! page layout defeats the selectors, a static 32-team table keeps the
//! dataset usable.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::Scraper;
use crate::enrich::enrichers::BROWSER_USER_AGENT;
use crate::models::TeamRecord;
use crate::utils::collapse_whitespace;

const NFL_TEAMS_URL: &str = "https://www.nfl.com/teams/";

/// Static fallback: the 32 NFL franchises.
const NFL_TEAMS_STATIC: &[(&str, &str, &str)] = &[
    ("Arizona Cardinals", "Arizona", "https://www.azcardinals.com/"),
    ("Atlanta Falcons", "Atlanta", "https://www.atlantafalcons.com/"),
    ("Baltimore Ravens", "Baltimore", "https://www.baltimoreravens.com/"),
    ("Buffalo Bills", "Buffalo", "https://www.buffalobills.com/"),
    ("Carolina Panthers", "Carolina", "https://www.panthers.com/"),
    ("Chicago Bears", "Chicago", "https://www.chicagobears.com/"),
    ("Cincinnati Bengals", "Cincinnati", "https://www.bengals.com/"),
    ("Cleveland Browns", "Cleveland", "https://www.clevelandbrowns.com/"),
    ("Dallas Cowboys", "Dallas", "https://www.dallascowboys.com/"),
    ("Denver Broncos", "Denver", "https://www.denverbroncos.com/"),
    ("Detroit Lions", "Detroit", "https://www.detroitlions.com/"),
    ("Green Bay Packers", "Green Bay", "https://www.packers.com/"),
    ("Houston Texans", "Houston", "https://www.houstontexans.com/"),
    ("Indianapolis Colts", "Indianapolis", "https://www.colts.com/"),
    ("Jacksonville Jaguars", "Jacksonville", "https://www.jaguars.com/"),
    ("Kansas City Chiefs", "Kansas City", "https://www.chiefs.com/"),
    ("Las Vegas Raiders", "Las Vegas", "https://www.raiders.com/"),
    ("Los Angeles Chargers", "Los Angeles", "https://www.chargers.com/"),
    ("Los Angeles Rams", "Los Angeles", "https://www.therams.com/"),
    ("Miami Dolphins", "Miami", "https://www.miamidolphins.com/"),
    ("Minnesota Vikings", "Minnesota", "https://www.vikings.com/"),
    ("New England Patriots", "New England", "https://www.patriots.com/"),
    ("New Orleans Saints", "New Orleans", "https://www.neworleanssaints.com/"),
    ("New York Giants", "New York", "https://www.giants.com/"),
    ("New York Jets", "New York", "https://www.newyorkjets.com/"),
    ("Philadelphia Eagles", "Philadelphia", "https://www.philadelphiaeagles.com/"),
    ("Pittsburgh Steelers", "Pittsburgh", "https://www.steelers.com/"),
    ("San Francisco 49ers", "San Francisco", "https://www.49ers.com/"),
    ("Seattle Seahawks", "Seattle", "https://www.seahawks.com/"),
    ("Tampa Bay Buccaneers", "Tampa Bay", "https://www.buccaneers.com/"),
    ("Tennessee Titans", "Tennessee", "https://www.tennesseetitans.com/"),
    ("Washington Commanders", "Washington", "https://www.commanders.com/"),
];

/// Extract the region/city prefix from a team name.
fn infer_region(team_name: &str) -> String {
    const MULTIWORD_REGIONS: &[&str] = &[
        "New York",
        "Los Angeles",
        "San Francisco",
        "Kansas City",
        "Las Vegas",
        "New England",
        "New Orleans",
        "Tampa Bay",
        "Green Bay",
    ];
    for region in MULTIWORD_REGIONS {
        if team_name.starts_with(&format!("{region} ")) {
            return region.to_string();
        }
    }
    team_name
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn record_for(name: &str, region: &str, url: &str) -> TeamRecord {
    TeamRecord {
        name: name.to_string(),
        region: region.to_string(),
        league: "NFL".to_string(),
        target_demographic: format!(
            "American football fans in and around {region}, plus the broader national NFL audience."
        ),
        official_url: url.to_string(),
        category: "NFL".to_string(),
        ..Default::default()
    }
}

/// Walk up from a link to find a plausible team name in nearby headings.
fn team_name_near(element: ElementRef<'_>) -> Option<String> {
    const BAD: &[&str] = &[
        "View Profile",
        "View Full Site",
        "Advertising",
        "NFC Teams",
        "AFC Teams",
    ];
    let heading = Selector::parse("h1, h2, h3, h4, strong, p").ok()?;

    let mut node = element;
    for _ in 0..6 {
        let parent = node.parent().and_then(ElementRef::wrap)?;
        node = parent;

        let mut candidates: Vec<String> = node
            .select(&heading)
            .take(40)
            .map(|tag| collapse_whitespace(&tag.text().collect::<Vec<_>>().join(" ")))
            .filter(|text| {
                text.len() >= 6
                    && text.len() <= 40
                    && text.chars().any(|c| c.is_ascii_alphabetic())
                    && !BAD.contains(&text.as_str())
            })
            .collect();

        if !candidates.is_empty() {
            candidates.sort_by_key(|text| std::cmp::Reverse(text.len()));
            return candidates.into_iter().next();
        }
    }
    None
}

/// Parse team cards from the live directory HTML.
fn parse_teams_page(html: &str) -> Vec<TeamRecord> {
    let document = Html::parse_document(html);
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut records = Vec::new();
    let mut seen_urls = Vec::new();

    for element in document.select(&anchor) {
        let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
        if !text.eq_ignore_ascii_case("view full site") {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let url = if let Some(stripped) = href.strip_prefix("//") {
            format!("https:{stripped}")
        } else {
            href.to_string()
        };
        if !url.starts_with("http") || seen_urls.contains(&url) {
            continue;
        }
        seen_urls.push(url.clone());

        let Some(name) = team_name_near(element) else {
            continue;
        };
        let region = infer_region(&name);
        records.push(record_for(&name, &region, &url));
    }

    records.sort_by(|a, b| (&a.region, &a.name).cmp(&(&b.region, &b.name)));
    records
}

/// Scrapes team data from the NFL.com official directory (32 teams).
pub struct NflScraper;

impl NflScraper {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    fn static_teams() -> Vec<TeamRecord> {
        NFL_TEAMS_STATIC
            .iter()
            .map(|(name, region, url)| record_for(name, region, url))
            .collect()
    }
}

#[async_trait]
impl Scraper for NflScraper {
    fn id(&self) -> &'static str {
        "nfl"
    }

    fn name(&self) -> &'static str {
        "NFL Teams"
    }

    fn description(&self) -> &'static str {
        "Scrapes team data from NFL.com official directory (32 NFL teams)."
    }

    fn source_url(&self) -> &'static str {
        NFL_TEAMS_URL
    }

    async fn scrape(&self) -> Result<Vec<TeamRecord>> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build NFL.com client")?;

        let live = match client.get(NFL_TEAMS_URL).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => response.text().await.ok().map(|html| parse_teams_page(&html)),
                Err(err) => {
                    warn!("NFL.com error status: {err}");
                    None
                }
            },
            Err(err) => {
                warn!("NFL.com request failed: {err}");
                None
            }
        };

        match live {
            Some(records) if records.len() >= 32 => Ok(records),
            Some(records) => {
                warn!(
                    parsed = records.len(),
                    "live parse incomplete, using static team table"
                );
                Ok(Self::static_teams())
            }
            None => Ok(Self::static_teams()),
        }
    }
}
