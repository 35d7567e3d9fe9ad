//! Data models for teams, enrichment results, and tasks.

mod task;
mod team;

pub use task::{EnricherProgress, EnricherRunState, EnrichmentTask, TaskStatus};
pub use team::{EnrichmentResult, FieldMap, SocialHandle, SponsorInfo, TeamRecord};
