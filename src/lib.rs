//! teamscout - sports team data acquisition and enrichment.
//!
//! League scrapers produce team datasets; the enrichment engine drives a
//! set of pluggable enrichers over those datasets with bounded concurrency,
//! retry, progress reporting, cancellation, and before/after diffing.

pub mod cli;
pub mod config;
pub mod enrich;
pub mod llm;
pub mod models;
pub mod scrapers;
pub mod server;
pub mod store;
pub mod utils;
