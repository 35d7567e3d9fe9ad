//! Built-in enricher implementations.
//!
//! Each enricher owns a declared set of fields and pulls from one external
//! source family; batching, concurrency, and retry come from the shared
//! driver.

mod brand;
mod geo;
mod social;
mod sponsor;
mod valuation;
mod website;

pub use brand::BrandEnricher;
pub use geo::GeoEnricher;
pub use social::SocialEnricher;
pub use sponsor::SponsorEnricher;
pub use valuation::ValuationEnricher;
pub use website::WebsiteEnricher;

/// User agent for generic team-website requests (some sites reject
/// non-browser clients).
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Descriptive user agent for WikiData (their policy requires contact info).
pub(crate) const WIKIDATA_USER_AGENT: &str =
    "teamscout/0.5 (https://github.com/playmkr/teamscout) reqwest";
