//! The enrichment engine.
//!
//! Drives pluggable enrichers over a batch of team records with bounded
//! concurrency, per-item retry, inter-batch pacing, progress reporting,
//! cancellation, and before/after diff computation.

mod config;
mod diff;
mod enricher;
pub mod enrichers;
mod orchestrator;
mod registry;
mod runner;

pub use config::EnricherConfig;
pub use diff::{compute_diff, ChangeType, EnrichmentDiff, FieldChange, TeamDiff};
pub use enricher::{EnrichOutcome, Enricher, EnricherInfo, ProgressCallback};
pub use orchestrator::{TaskError, TaskList, TaskOrchestrator};
pub use registry::{default_registry, EnricherRegistry};
pub use runner::EnrichmentRunner;
