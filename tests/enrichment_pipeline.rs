//! End-to-end enrichment pipeline test over the public library API:
//! stored dataset -> orchestrated task -> enriched dataset + diff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teamscout::enrich::{
    ChangeType, EnrichOutcome, Enricher, EnricherConfig, EnricherRegistry, TaskOrchestrator,
};
use teamscout::models::{EnricherRunState, TaskStatus, TeamRecord};
use teamscout::store::TeamStore;

/// Stub geo enricher: populates `city_population` once.
struct GeoStub {
    config: EnricherConfig,
}

impl GeoStub {
    fn new(config: EnricherConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Enricher for GeoStub {
    fn id(&self) -> &'static str {
        "geo"
    }
    fn name(&self) -> &'static str {
        "Geo Stub"
    }
    fn description(&self) -> &'static str {
        "Adds population"
    }
    fn fields_added(&self) -> &'static [&'static str] {
        &["city_population"]
    }
    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> anyhow::Result<EnrichOutcome> {
        if record.city_population.is_none() {
            record.city_population = Some(2_000_000);
            Ok(EnrichOutcome::changed(&["city_population"]))
        } else {
            Ok(EnrichOutcome::NoChange)
        }
    }
}

/// Stub social enricher: records an explicit handle list.
struct SocialStub {
    config: EnricherConfig,
}

impl SocialStub {
    fn new(config: EnricherConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Enricher for SocialStub {
    fn id(&self) -> &'static str {
        "social"
    }
    fn name(&self) -> &'static str {
        "Social Stub"
    }
    fn description(&self) -> &'static str {
        "Adds follower counts"
    }
    fn fields_added(&self) -> &'static [&'static str] {
        &["followers_x"]
    }
    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> anyhow::Result<EnrichOutcome> {
        if record.followers_x.is_none() {
            record.followers_x = Some(500_000);
            Ok(EnrichOutcome::changed(&["followers_x"]))
        } else {
            Ok(EnrichOutcome::NoChange)
        }
    }
}

fn team(name: &str, region: &str) -> TeamRecord {
    TeamRecord {
        name: name.to_string(),
        region: region.to_string(),
        league: "NFL".to_string(),
        target_demographic: format!("Football fans in {region}"),
        official_url: format!("https://www.{}.example/", name.to_lowercase()),
        category: "NFL".to_string(),
        ..Default::default()
    }
}

fn fast_config() -> EnricherConfig {
    EnricherConfig {
        retry_delay: Duration::from_millis(1),
        batch_delay: Duration::ZERO,
        ..Default::default()
    }
}

#[tokio::test]
async fn enrichment_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TeamStore::new(dir.path()));
    store
        .save_teams(
            "nfl",
            &[
                team("Seahawks", "Seattle"),
                team("49ers", "San Francisco"),
                team("Cardinals", "Arizona"),
            ],
        )
        .unwrap();

    let mut registry = EnricherRegistry::new();
    registry.register(GeoStub::new);
    registry.register(SocialStub::new);

    let orchestrator = Arc::new(TaskOrchestrator::new(
        Arc::new(registry),
        Arc::clone(&store),
        fast_config(),
    ));

    // Initial snapshot: pending, with one pending slot per enricher
    let task = orchestrator
        .create_task("nfl", "NFL Teams", vec!["geo".to_string(), "social".to_string()])
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.total_teams, 3);
    assert_eq!(task.progress["geo"].status, EnricherRunState::Pending);
    assert_eq!(task.progress["social"].status, EnricherRunState::Pending);

    let mut updates = orchestrator.subscribe(&task.id).unwrap();
    Arc::clone(&orchestrator).start_task(&task.id).unwrap();

    let mut terminal = None;
    while let Some(snapshot) = updates.recv().await {
        if snapshot.is_terminal() {
            terminal = Some(snapshot);
            break;
        }
    }
    let done = terminal.expect("terminal snapshot");

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(
        done.teams_enriched,
        done.progress["geo"].enriched + done.progress["social"].enriched
    );
    assert_eq!(done.progress["geo"].enriched, 3);
    assert_eq!(done.progress["social"].enriched, 3);

    // Diff: every team gained exactly two fields
    let diff = done.diff.as_ref().expect("diff on completed task");
    assert!(diff.teams_changed <= 3);
    assert_eq!(diff.teams_changed, 3);
    assert_eq!(diff.fields_added, 6);
    assert_eq!(diff.fields_modified, 0);
    for team_diff in &diff.team_diffs {
        assert_eq!(team_diff.changes.len(), 2);
        assert!(team_diff
            .changes
            .iter()
            .all(|change| change.change_type == ChangeType::Added));
    }

    // The enriched dataset was written back to the store
    let saved = store.load_teams("nfl").unwrap();
    assert_eq!(saved.len(), 3);
    for record in &saved {
        assert_eq!(record.city_population, Some(2_000_000));
        assert_eq!(record.followers_x, Some(500_000));
        assert_eq!(
            record.enrichments_applied,
            Some(vec!["geo".to_string(), "social".to_string()])
        );
        assert!(record.last_enriched.is_some());
    }

    // Task is queryable from history, and its diff endpoint contract holds
    let fetched = orchestrator.get_task(&done.id).expect("task in history");
    assert_eq!(fetched.status, TaskStatus::Completed);
    let diff = orchestrator.get_diff(&done.id).unwrap();
    assert_eq!(diff.teams_changed, 3);

    // Running the same enrichers again changes nothing (idempotent fields)
    let rerun = orchestrator
        .create_task("nfl", "NFL Teams", vec!["geo".to_string(), "social".to_string()])
        .unwrap();
    let mut updates = orchestrator.subscribe(&rerun.id).unwrap();
    Arc::clone(&orchestrator).start_task(&rerun.id).unwrap();
    let mut terminal = None;
    while let Some(snapshot) = updates.recv().await {
        if snapshot.is_terminal() {
            terminal = Some(snapshot);
            break;
        }
    }
    let rerun_done = terminal.expect("terminal snapshot");
    assert_eq!(rerun_done.status, TaskStatus::Completed);
    assert_eq!(rerun_done.teams_enriched, 0);
    let rerun_diff = rerun_done.diff.as_ref().unwrap();
    assert_eq!(rerun_diff.teams_changed, 0);
}
