//! Geographic enricher.
//!
//! Resolves a team's region to a US Census place and fetches its city
//! population from the Data Commons `stat/value` API (which works without
//! an API key, at lower quotas). Canadian cities are recognized but have
//! no GeoID and are skipped for population lookup.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::enrich::{EnrichOutcome, Enricher, EnricherConfig};
use crate::models::TeamRecord;

const DATA_COMMONS_STAT_URL: &str = "https://api.datacommons.org/stat/value";
const POPULATION_VARIABLE: &str = "Count_Person";

/// Region -> (GeoID, country). GeoIDs are US Census FIPS place codes in
/// Data Commons form; Canadian cities have no GeoID.
const CITY_GEOIDS: &[(&str, Option<&str>, &str)] = &[
    ("Arizona", Some("geoId/0455000"), "US"), // Phoenix, AZ
    ("Atlanta", Some("geoId/1304000"), "US"),
    ("Baltimore", Some("geoId/2404000"), "US"),
    ("Boston", Some("geoId/2507000"), "US"),
    ("Buffalo", Some("geoId/3611000"), "US"),
    ("Carolina", Some("geoId/3712000"), "US"), // Charlotte, NC
    ("Charlotte", Some("geoId/3712000"), "US"),
    ("Chicago", Some("geoId/1714000"), "US"),
    ("Cincinnati", Some("geoId/3915000"), "US"),
    ("Cleveland", Some("geoId/3916000"), "US"),
    ("Columbus", Some("geoId/3918000"), "US"),
    ("Dallas", Some("geoId/4819000"), "US"),
    ("Denver", Some("geoId/0820000"), "US"),
    ("Detroit", Some("geoId/2622000"), "US"),
    ("Green Bay", Some("geoId/5531000"), "US"),
    ("Houston", Some("geoId/4835000"), "US"),
    ("Indianapolis", Some("geoId/1836003"), "US"),
    ("Jacksonville", Some("geoId/1235000"), "US"),
    ("Kansas City", Some("geoId/2938000"), "US"),
    ("Las Vegas", Some("geoId/3240000"), "US"),
    ("Los Angeles", Some("geoId/0644000"), "US"),
    ("Miami", Some("geoId/1245000"), "US"),
    ("Milwaukee", Some("geoId/5553000"), "US"),
    ("Minneapolis", Some("geoId/2743000"), "US"),
    ("Minnesota", Some("geoId/2743000"), "US"), // state name -> Minneapolis
    ("Nashville", Some("geoId/4752006"), "US"),
    ("New England", Some("geoId/2507000"), "US"), // regional -> Boston
    ("New Orleans", Some("geoId/2255000"), "US"),
    ("New York", Some("geoId/3651000"), "US"),
    ("Oakland", Some("geoId/0653000"), "US"),
    ("Oklahoma City", Some("geoId/4055000"), "US"),
    ("Orlando", Some("geoId/1253000"), "US"),
    ("Philadelphia", Some("geoId/4260000"), "US"),
    ("Phoenix", Some("geoId/0455000"), "US"),
    ("Pittsburgh", Some("geoId/4261000"), "US"),
    ("Portland", Some("geoId/4159000"), "US"),
    ("Raleigh", Some("geoId/3755000"), "US"),
    ("Sacramento", Some("geoId/0664000"), "US"),
    ("Salt Lake City", Some("geoId/4967000"), "US"),
    ("San Antonio", Some("geoId/4865000"), "US"),
    ("San Diego", Some("geoId/0666000"), "US"),
    ("San Francisco", Some("geoId/0667000"), "US"),
    ("San Jose", Some("geoId/0668000"), "US"),
    ("Seattle", Some("geoId/5363000"), "US"),
    ("St. Louis", Some("geoId/2965000"), "US"),
    ("Tampa", Some("geoId/1271000"), "US"),
    ("Tampa Bay", Some("geoId/1271000"), "US"),
    ("Tennessee", Some("geoId/4752006"), "US"), // state name -> Nashville
    ("Washington", Some("geoId/1150000"), "US"),
    ("Washington D.C.", Some("geoId/1150000"), "US"),
    ("Anaheim", Some("geoId/0602000"), "US"),
    ("Arlington", Some("geoId/4804000"), "US"),
    ("Bronx", Some("geoId/3651000"), "US"),
    ("Brooklyn", Some("geoId/3651000"), "US"),
    ("Queens", Some("geoId/3651000"), "US"),
    ("St. Petersburg", Some("geoId/1263000"), "US"),
    // Canada - not in the US Census, population lookup skipped
    ("Calgary", None, "CA"),
    ("Edmonton", None, "CA"),
    ("Montreal", None, "CA"),
    ("Ottawa", None, "CA"),
    ("Toronto", None, "CA"),
    ("Vancouver", None, "CA"),
    ("Winnipeg", None, "CA"),
    // Common minor-league cities
    ("Akron", Some("geoId/3901000"), "US"),
    ("Albuquerque", Some("geoId/3502000"), "US"),
    ("Austin", Some("geoId/4805000"), "US"),
    ("Des Moines", Some("geoId/1921000"), "US"),
    ("Durham", Some("geoId/3719000"), "US"),
    ("El Paso", Some("geoId/4824000"), "US"),
    ("Fresno", Some("geoId/0627000"), "US"),
    ("Grand Rapids", Some("geoId/2634000"), "US"),
    ("Hartford", Some("geoId/0937000"), "US"),
    ("Iowa", Some("geoId/1921000"), "US"), // Des Moines, IA
    ("Lehigh Valley", Some("geoId/4202000"), "US"), // Allentown, PA
    ("Louisville", Some("geoId/2148006"), "US"),
    ("Memphis", Some("geoId/4748000"), "US"),
    ("Norfolk", Some("geoId/5157000"), "US"),
    ("Omaha", Some("geoId/3137000"), "US"),
    ("Providence", Some("geoId/4459000"), "US"),
    ("Richmond", Some("geoId/5167000"), "US"),
    ("Rochester", Some("geoId/3663000"), "US"),
    ("Round Rock", Some("geoId/4863500"), "US"),
    ("Scranton", Some("geoId/4269000"), "US"),
    ("St. Paul", Some("geoId/2758000"), "US"),
    ("Syracuse", Some("geoId/3673000"), "US"),
    ("Tacoma", Some("geoId/5370000"), "US"),
    ("Toledo", Some("geoId/3977000"), "US"),
    ("Tucson", Some("geoId/0477000"), "US"),
    ("Tulsa", Some("geoId/4075000"), "US"),
    ("Wichita", Some("geoId/2079000"), "US"),
    ("Worcester", Some("geoId/2582000"), "US"),
];

/// Alternative region names seen in upstream data.
const CITY_ALIASES: &[(&str, &str)] = &[
    ("D.C.", "Washington D.C."),
    ("DC", "Washington D.C."),
    ("LA", "Los Angeles"),
    ("NYC", "New York"),
    ("NOLA", "New Orleans"),
    ("Philly", "Philadelphia"),
    ("Bay Area", "San Francisco"),
    ("Twin Cities", "Minneapolis"),
    ("Foxborough", "New England"),
    ("Foxboro", "New England"),
    ("East Rutherford", "New York"),
    ("Glendale", "Phoenix"),        // Cardinals stadium
    ("Inglewood", "Los Angeles"),   // SoFi Stadium
    ("Landover", "Washington"),     // Commanders stadium
    ("Orchard Park", "Buffalo"),    // Bills stadium
    ("Santa Clara", "San Francisco"), // 49ers stadium
];

#[derive(Debug, Deserialize)]
struct StatValueResponse {
    value: Option<f64>,
}

/// Adds city and population data from Data Commons.
pub struct GeoEnricher {
    config: EnricherConfig,
    client: RwLock<Option<Client>>,
    /// GeoID -> population, shared across one run.
    population_cache: Mutex<HashMap<String, Option<u64>>>,
}

impl GeoEnricher {
    pub fn new(config: EnricherConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            population_cache: Mutex::new(HashMap::new()),
        }
    }

    fn client(&self) -> Option<Client> {
        self.client.read().ok().and_then(|guard| guard.clone())
    }

    async fn fetch_population(&self, geo_id: &str) -> Result<Option<u64>> {
        if let Some(cached) = self
            .population_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(geo_id).copied())
        {
            return Ok(cached);
        }

        let Some(client) = self.client() else {
            return Ok(None);
        };

        let response = client
            .get(DATA_COMMONS_STAT_URL)
            .query(&[("place", geo_id), ("stat_var", POPULATION_VARIABLE)])
            .send()
            .await
            .context("Data Commons request failed")?
            .error_for_status()
            .context("Data Commons returned an error status")?;

        let body: StatValueResponse = response
            .json()
            .await
            .context("invalid Data Commons response")?;
        let population = body.value.map(|value| value as u64);

        debug!(geo_id, ?population, "fetched population");
        if let Ok(mut cache) = self.population_cache.lock() {
            cache.insert(geo_id.to_string(), population);
        }
        Ok(population)
    }
}

/// Normalize a region string to a known city entry.
fn resolve_city(region: &str) -> Option<(&'static str, Option<&'static str>, &'static str)> {
    let cleaned = region.trim();
    if cleaned.is_empty() {
        return None;
    }

    let cleaned = CITY_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(cleaned))
        .map(|(_, canonical)| *canonical)
        .unwrap_or(cleaned);

    CITY_GEOIDS
        .iter()
        .find(|(city, _, _)| city.eq_ignore_ascii_case(cleaned))
        .map(|(city, geo_id, country)| (*city, *geo_id, *country))
}

#[async_trait]
impl Enricher for GeoEnricher {
    fn id(&self) -> &'static str {
        "geo"
    }

    fn name(&self) -> &'static str {
        "Geographic Enricher"
    }

    fn description(&self) -> &'static str {
        "Adds resolved city and city population data from the Data Commons API"
    }

    fn fields_added(&self) -> &'static [&'static str] {
        &["geo_city", "geo_country", "city_population", "metro_gdp_millions"]
    }

    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn pre_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        let client = Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .context("failed to build Data Commons client")?;
        if let Ok(mut guard) = self.client.write() {
            *guard = Some(client);
        }
        Ok(())
    }

    async fn post_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        if let Ok(mut guard) = self.client.write() {
            *guard = None;
        }
        if let Ok(mut cache) = self.population_cache.lock() {
            cache.clear();
        }
        Ok(())
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> Result<EnrichOutcome> {
        let Some((city, geo_id, country)) = resolve_city(&record.region) else {
            return Ok(EnrichOutcome::NoChange);
        };

        let mut written = Vec::new();

        if record.geo_city.is_none() {
            record.geo_city = Some(city.to_string());
            written.push("geo_city".to_string());
        }
        if record.geo_country.is_none() {
            record.geo_country = Some(country.to_string());
            written.push("geo_country".to_string());
        }

        if record.city_population.is_none() {
            if let Some(geo_id) = geo_id {
                if let Some(population) = self.fetch_population(geo_id).await? {
                    record.city_population = Some(population);
                    written.push("city_population".to_string());
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
    use super::*;

    #[test]
    fn test_resolve_direct_city() {
        let (city, geo_id, country) = resolve_city("Seattle").unwrap();
        assert_eq!(city, "Seattle");
        assert_eq!(geo_id, Some("geoId/5363000"));
        assert_eq!(country, "US");
    }

    #[test]
    fn test_resolve_alias() {
        let (city, _, _) = resolve_city("Philly").unwrap();
        assert_eq!(city, "Philadelphia");
        let (city, _, _) = resolve_city("Santa Clara").unwrap();
        assert_eq!(city, "San Francisco");
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let (city, _, _) = resolve_city("tampa bay").unwrap();
        assert_eq!(city, "Tampa Bay");
    }

    #[test]
    fn test_resolve_canadian_city_has_no_geoid() {
        let (city, geo_id, country) = resolve_city("Toronto").unwrap();
        assert_eq!(city, "Toronto");
        assert_eq!(geo_id, None);
        assert_eq!(country, "CA");
    }

    #[test]
    fn test_resolve_unknown_region() {
        assert!(resolve_city("Atlantis").is_none());
        assert!(resolve_city("").is_none());
    }

    #[tokio::test]
    async fn test_canadian_team_gets_city_without_population() {
        // No HTTP call happens for a region without a GeoID
        let enricher = GeoEnricher::new(EnricherConfig::default());
        let mut record = TeamRecord {
            name: "Maple Leafs".to_string(),
            region: "Toronto".to_string(),
            ..Default::default()
        };

        let outcome = enricher.enrich_one(&mut record).await.unwrap();
        assert_eq!(
            outcome,
            EnrichOutcome::Changed(vec!["geo_city".to_string(), "geo_country".to_string()])
        );
        assert_eq!(record.geo_city.as_deref(), Some("Toronto"));
        assert_eq!(record.geo_country.as_deref(), Some("CA"));
        assert_eq!(record.city_population, None);
    }

    #[tokio::test]
    async fn test_unknown_region_is_nochange() {
        let enricher = GeoEnricher::new(EnricherConfig::default());
        let mut record = TeamRecord {
            name: "Krakens".to_string(),
            region: "Atlantis".to_string(),
            ..Default::default()
        };
        let outcome = enricher.enrich_one(&mut record).await.unwrap();
        assert_eq!(outcome, EnrichOutcome::NoChange);
    }
}
