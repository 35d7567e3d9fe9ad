//! The enricher capability contract.
//!
//! An enricher is a named, independently pluggable unit of work that
//! populates a declared subset of fields on each record in a batch. The
//! only method a concrete enricher must implement is [`Enricher::enrich_one`];
//! batching, concurrency, retry, and pacing are provided by the shared
//! driver ([`crate::enrich::EnrichmentRunner`]).

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::enrich::EnricherConfig;
use crate::models::TeamRecord;

/// Outcome of enriching a single record.
///
/// A tagged result instead of a bare boolean so the driver and tests can
/// assert exactly which fields were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Nothing new was written (fields already populated, or no data found).
    NoChange,
    /// New data was written to the named fields.
    Changed(Vec<String>),
}

impl EnrichOutcome {
    /// Convenience constructor from field name slices.
    pub fn changed(fields: &[&str]) -> Self {
        Self::Changed(fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Progress callback invoked with (processed, enriched, total) after each
/// item completes.
pub type ProgressCallback = Box<dyn Fn(usize, usize, usize) + Send + Sync>;

/// Static metadata about an enricher, for discovery and listing UIs.
#[derive(Debug, Clone, Serialize)]
pub struct EnricherInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub fields_added: Vec<String>,
    pub available: bool,
}

/// A pluggable enrichment unit.
///
/// Field ownership is a documented contract: fields declared in
/// `fields_added` are written by this enricher and no other. Enrichers must
/// no-op on already-populated fields unless a run explicitly forces
/// re-enrichment.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Stable identifier used in tracking and task requests.
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// What data this enricher adds.
    fn description(&self) -> &'static str;

    /// The exact field set this enricher owns.
    fn fields_added(&self) -> &'static [&'static str];

    /// The configuration this instance was created with.
    fn config(&self) -> &EnricherConfig;

    /// Cheap, synchronous availability check (e.g., "do I have the API key
    /// I need"). Must be side-effect free: the registry calls it
    /// speculatively when listing enrichers.
    fn is_available(&self) -> bool {
        true
    }

    /// Hook called once per run before any item is processed. Set up shared
    /// resources here (HTTP clients, pre-fetched caches) rather than per
    /// item.
    async fn pre_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        Ok(())
    }

    /// Hook called once per run after all items are processed.
    async fn post_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        Ok(())
    }

    /// Enrich a single record in place.
    ///
    /// Errors are isolated by the driver: they are retried per policy and
    /// then recorded against this item only, never aborting the batch.
    /// Timeouts for individual network operations are this method's own
    /// responsibility (configure them on the HTTP client).
    async fn enrich_one(&self, record: &mut TeamRecord) -> Result<EnrichOutcome>;

    /// Metadata snapshot for API responses.
    fn info(&self) -> EnricherInfo {
        EnricherInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            fields_added: self
                .fields_added()
                .iter()
                .map(|f| f.to_string())
                .collect(),
            available: self.is_available(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_changed() {
        let outcome = EnrichOutcome::changed(&["city_population"]);
        assert!(outcome.is_changed());
        assert_eq!(
            outcome,
            EnrichOutcome::Changed(vec!["city_population".to_string()])
        );
        assert!(!EnrichOutcome::NoChange.is_changed());
    }
}
