//! Catalog of available enrichers.
//!
//! The registry is constructed explicitly at startup and passed by
//! reference into the orchestrator; new enrichers plug in by registering a
//! factory, without touching orchestration code.

use std::collections::HashMap;

use crate::enrich::enrichers::{
    BrandEnricher, GeoEnricher, SocialEnricher, SponsorEnricher, ValuationEnricher,
    WebsiteEnricher,
};
use crate::enrich::{Enricher, EnricherConfig, EnricherInfo};

type EnricherFactory = Box<dyn Fn(EnricherConfig) -> Box<dyn Enricher> + Send + Sync>;

/// Maps enricher identifier -> factory. Read-mostly after startup.
#[derive(Default)]
pub struct EnricherRegistry {
    factories: HashMap<String, EnricherFactory>,
}

impl EnricherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enricher by factory. The identifier is derived from the
    /// instance itself, so an id can never drift from its implementation.
    /// Registration is idempotent per id; the last registration wins.
    pub fn register<E, F>(&mut self, factory: F)
    where
        E: Enricher + 'static,
        F: Fn(EnricherConfig) -> E + Send + Sync + 'static,
    {
        let id = factory(EnricherConfig::default()).id().to_string();
        self.factories.insert(
            id,
            Box::new(move |config| Box::new(factory(config)) as Box<dyn Enricher>),
        );
    }

    /// Whether an enricher id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Instantiate an enricher by id. Returns `None` for an unknown id;
    /// callers must check.
    pub fn create(&self, id: &str, config: EnricherConfig) -> Option<Box<dyn Enricher>> {
        self.factories.get(id).map(|factory| factory(config))
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Metadata for every registered enricher, sorted by id.
    ///
    /// Instantiates each enricher transiently with a default configuration
    /// purely to query static metadata and availability; `is_available()`
    /// must therefore be side-effect free.
    pub fn list_all(&self) -> Vec<EnricherInfo> {
        let mut infos: Vec<EnricherInfo> = self
            .factories
            .values()
            .map(|factory| factory(EnricherConfig::default()).info())
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }
}

/// Registry with every built-in enricher, as wired at process start.
pub fn default_registry() -> EnricherRegistry {
    let mut registry = EnricherRegistry::new();
    registry.register(GeoEnricher::new);
    registry.register(SocialEnricher::new);
    registry.register(WebsiteEnricher::new);
    registry.register(SponsorEnricher::new);
    registry.register(ValuationEnricher::new);
    registry.register(BrandEnricher::new);
    registry
}
