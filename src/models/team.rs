//! Team record model supporting core scraped fields and enrichment layers.
//!
//! Enrichment fields are nullable: absence means "not yet enriched", not
//! "known empty". Enrichers may write an explicitly empty collection to
//! record "checked, nothing found".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A social media handle for a team.
///
/// Stores the username plus a stable unique ID where the platform has one
/// (for YouTube the channel ID is the stable identifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialHandle {
    /// Platform key: "x", "instagram", "facebook", "tiktok", "youtube".
    pub platform: String,
    /// Username/handle (e.g., "Lakers", "yankees").
    pub handle: String,
    /// Full profile URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Stable ID if available (YouTube channel ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

/// A sponsor partnership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorInfo {
    pub name: String,
    /// e.g., "Apparel", "Beverage", "Financial".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// e.g., "Jersey Patch", "Naming Rights", "Official Partner".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
}

/// One team's data, mutated across the enrichment pipeline.
///
/// Core fields are set by the upstream scraper and immutable with respect
/// to enrichment. Each enrichment field group is owned by exactly one
/// enricher (a documented contract, not enforced here).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamRecord {
    // Core fields (set by the scraper)
    pub name: String,
    pub region: String,
    pub league: String,
    pub target_demographic: String,
    pub official_url: String,
    pub category: String,
    #[serde(default)]
    pub logo_url: Option<String>,

    // Geographic (geo enricher)
    #[serde(default)]
    pub geo_city: Option<String>,
    #[serde(default)]
    pub geo_country: Option<String>,
    #[serde(default)]
    pub city_population: Option<u64>,
    #[serde(default)]
    pub metro_gdp_millions: Option<f64>,

    // Social / audience (social enricher)
    #[serde(default)]
    pub social_handles: Option<Vec<SocialHandle>>,
    #[serde(default)]
    pub followers_x: Option<u64>,
    #[serde(default)]
    pub followers_instagram: Option<u64>,
    #[serde(default)]
    pub followers_facebook: Option<u64>,
    #[serde(default)]
    pub followers_tiktok: Option<u64>,
    #[serde(default)]
    pub subscribers_youtube: Option<u64>,
    #[serde(default)]
    pub avg_game_attendance: Option<u64>,

    // Family friendliness (website enricher)
    #[serde(default)]
    pub family_program_count: Option<u32>,
    #[serde(default)]
    pub family_program_types: Option<Vec<String>>,

    // Inventory / sponsors (sponsor enricher)
    #[serde(default)]
    pub owns_stadium: Option<bool>,
    #[serde(default)]
    pub stadium_name: Option<String>,
    #[serde(default)]
    pub sponsors: Option<Vec<SponsorInfo>>,

    // Pricing / valuation (valuation enricher)
    #[serde(default)]
    pub avg_ticket_price: Option<f64>,
    #[serde(default)]
    pub franchise_value_millions: Option<f64>,
    #[serde(default)]
    pub annual_revenue_millions: Option<f64>,

    // Brand alignment (brand enricher)
    #[serde(default)]
    pub mission_tags: Option<Vec<String>>,
    #[serde(default)]
    pub community_programs: Option<Vec<String>>,
    #[serde(default)]
    pub cause_partnerships: Option<Vec<String>>,

    // Enrichment metadata (bookkeeping, excluded from diffs)
    #[serde(default)]
    pub enrichments_applied: Option<Vec<String>>,
    #[serde(default)]
    pub last_enriched: Option<DateTime<Utc>>,
}

/// Ordered field-name -> value projection of a record.
///
/// The diff engine operates on this view rather than on the struct shape,
/// so the record type can evolve without touching diff logic.
pub type FieldMap = Vec<(String, Value)>;

impl TeamRecord {
    /// Mark that an enricher has been applied (append-only, deduplicated).
    pub fn apply_enrichment(&mut self, enricher_id: &str) {
        let applied = self.enrichments_applied.get_or_insert_with(Vec::new);
        if !applied.iter().any(|id| id == enricher_id) {
            applied.push(enricher_id.to_string());
        }
        self.last_enriched = Some(Utc::now());
    }

    /// Check whether a specific enricher has been applied.
    pub fn has_enrichment(&self, enricher_id: &str) -> bool {
        self.enrichments_applied
            .as_ref()
            .is_some_and(|applied| applied.iter().any(|id| id == enricher_id))
    }

    /// Project the record into an ordered field map (declaration order).
    ///
    /// Includes every field, bookkeeping included; the diff engine applies
    /// its own exclusion list.
    pub fn field_map(&self) -> FieldMap {
        fn v<T: Serialize>(value: &T) -> Value {
            serde_json::to_value(value).unwrap_or(Value::Null)
        }

        let fields: [(&str, Value); 29] = [
            ("name", v(&self.name)),
            ("region", v(&self.region)),
            ("league", v(&self.league)),
            ("target_demographic", v(&self.target_demographic)),
            ("official_url", v(&self.official_url)),
            ("category", v(&self.category)),
            ("logo_url", v(&self.logo_url)),
            ("geo_city", v(&self.geo_city)),
            ("geo_country", v(&self.geo_country)),
            ("city_population", v(&self.city_population)),
            ("metro_gdp_millions", v(&self.metro_gdp_millions)),
            ("social_handles", v(&self.social_handles)),
            ("followers_x", v(&self.followers_x)),
            ("followers_instagram", v(&self.followers_instagram)),
            ("followers_facebook", v(&self.followers_facebook)),
            ("followers_tiktok", v(&self.followers_tiktok)),
            ("subscribers_youtube", v(&self.subscribers_youtube)),
            ("avg_game_attendance", v(&self.avg_game_attendance)),
            ("family_program_count", v(&self.family_program_count)),
            ("family_program_types", v(&self.family_program_types)),
            ("owns_stadium", v(&self.owns_stadium)),
            ("stadium_name", v(&self.stadium_name)),
            ("sponsors", v(&self.sponsors)),
            ("avg_ticket_price", v(&self.avg_ticket_price)),
            ("franchise_value_millions", v(&self.franchise_value_millions)),
            ("annual_revenue_millions", v(&self.annual_revenue_millions)),
            ("mission_tags", v(&self.mission_tags)),
            ("community_programs", v(&self.community_programs)),
            ("cause_partnerships", v(&self.cause_partnerships)),
        ];

        let mut map: FieldMap = fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        map.push(("enrichments_applied".to_string(), v(&self.enrichments_applied)));
        map.push(("last_enriched".to_string(), v(&self.last_enriched)));
        map
    }
}

/// Result of one enricher invocation over a batch of records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub success: bool,
    pub enricher_name: String,
    /// Number of records attempted.
    pub teams_processed: usize,
    /// Number of records that reported new data.
    pub teams_enriched: usize,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Enricher-specific statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl EnrichmentResult {
    /// A successful result.
    pub fn success(
        enricher_name: impl Into<String>,
        processed: usize,
        enriched: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            success: true,
            enricher_name: enricher_name.into(),
            teams_processed: processed,
            teams_enriched: enriched,
            duration_ms,
            timestamp,
            error: None,
            details: None,
        }
    }

    /// A failed result with an error message.
    pub fn failure(
        enricher_name: impl Into<String>,
        processed: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            enricher_name: enricher_name.into(),
            teams_processed: processed,
            teams_enriched: 0,
            duration_ms,
            timestamp,
            error: Some(error.into()),
            details: None,
        }
    }
}
