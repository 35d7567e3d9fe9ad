//! Family friendliness enricher.
//!
//! Probes a bounded list of family/kids paths on the official site and
//! scans page text for family-program keywords, recording the distinct
//! program types detected.

use std::collections::BTreeSet;
use std::sync::{OnceLock, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::enrich::enrichers::BROWSER_USER_AGENT;
use crate::enrich::{EnrichOutcome, Enricher, EnricherConfig};
use crate::models::TeamRecord;
use crate::utils::html_to_text;

/// URL paths commonly hosting family/kids content. Bounded deliberately:
/// every path is a request against someone else's site.
const FAMILY_URL_PATHS: &[&str] = &[
    "/kids",
    "/kids-club",
    "/junior-fan",
    "/youth",
    "/family",
    "/tickets/family",
    "/camps",
    "/community/youth",
];

/// Program type -> detection patterns (case-insensitive).
fn program_patterns() -> &'static Vec<(&'static str, Regex)> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let sources: &[(&str, &str)] = &[
            ("Kids Club", r"(?i)kids?\s*club|junior\s*fan\s*club|kids?\s*zone|kids\s*corner"),
            (
                "Family Pack",
                r"(?i)family\s*pack(?:age)?s?|family\s*bundle|family\s*(?:fun|value)\s*pack",
            ),
            (
                "Youth Night",
                r"(?i)youth\s*night|kids?\s*(?:night|day)|kids?\s*eat\s*free|family\s*(?:sunday|friday|night)",
            ),
            (
                "Youth Academy",
                r"(?i)youth\s*(?:academy|program|development|sports?)|little\s*league|learn\s*to\s*play",
            ),
            (
                "Summer Camp",
                r"(?i)summer\s*camp|(?:baseball|basketball|hockey|football|sports?|day|youth|kids?)\s*camp",
            ),
            (
                "Birthday Party",
                r"(?i)birthday\s*part(?:y|ies)|birthday\s*(?:package|experience|bash)",
            ),
            (
                "School Programs",
                r"(?i)school\s*program|reading\s*program|field\s*trip|stem\s*program|classroom\s*program",
            ),
        ];
        sources
            .iter()
            .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (*label, re)))
            .collect()
    })
}

/// Detect program types present in page text.
fn detect_programs(text: &str) -> BTreeSet<&'static str> {
    program_patterns()
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text))
        .map(|(label, _)| *label)
        .collect()
}

/// Detects family-oriented programs on team websites.
pub struct WebsiteEnricher {
    config: EnricherConfig,
    client: RwLock<Option<Client>>,
}

impl WebsiteEnricher {
    pub fn new(config: EnricherConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    fn client(&self) -> Option<Client> {
        self.client.read().ok().and_then(|guard| guard.clone())
    }

    /// Fetch a page, returning `None` for any failure: a missing kids page
    /// is expected, not an error.
    async fn fetch_page(&self, url: &str) -> Option<String> {
        let client = self.client()?;
        let response = client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }
}

#[async_trait]
impl Enricher for WebsiteEnricher {
    fn id(&self) -> &'static str {
        "website"
    }

    fn name(&self) -> &'static str {
        "Website Enricher"
    }

    fn description(&self) -> &'static str {
        "Detects family-friendly content and programs from team websites"
    }

    fn fields_added(&self) -> &'static [&'static str] {
        &["family_program_count", "family_program_types"]
    }

    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn pre_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(self.config.request_timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build website HTTP client")?;
        if let Ok(mut guard) = self.client.write() {
            *guard = Some(client);
        }
        Ok(())
    }

    async fn post_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        if let Ok(mut guard) = self.client.write() {
            *guard = None;
        }
        Ok(())
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> Result<EnrichOutcome> {
        if record.family_program_count.is_some() {
            return Ok(EnrichOutcome::NoChange);
        }
        if record.official_url.is_empty() {
            return Ok(EnrichOutcome::NoChange);
        }

        let base = Url::parse(&record.official_url)
            .with_context(|| format!("invalid official url for {}", record.name))?;

        let mut programs: BTreeSet<&'static str> = BTreeSet::new();

        if let Some(html) = self.fetch_page(base.as_str()).await {
            programs.extend(detect_programs(&html_to_text(&html)));
        }

        for path in FAMILY_URL_PATHS {
            let Ok(url) = base.join(path) else { continue };
            if let Some(html) = self.fetch_page(url.as_str()).await {
                programs.extend(detect_programs(&html_to_text(&html)));
            }
        }

        debug!(team = %record.name, programs = programs.len(), "family program scan done");

        let types: Vec<String> = programs.iter().map(|label| label.to_string()).collect();
        record.family_program_count = Some(types.len() as u32);
        // An explicit empty list records "checked, nothing found"
        record.family_program_types = Some(types.clone());

        if types.is_empty() {
            Ok(EnrichOutcome::NoChange)
        } else {
            Ok(EnrichOutcome::changed(&[
                "family_program_count",
                "family_program_types",
            ]))
        }
    }
}
