//! Task orchestration for enrichment runs.
//!
//! Owns the lifecycle of a user-initiated enrichment request: sequences
//! enrichers strictly one after another, aggregates progress, fans out
//! snapshots to subscribers, supports cooperative cancellation, and
//! computes the before/after diff on successful completion.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::enrich::{
    compute_diff, EnricherConfig, EnricherRegistry, EnrichmentDiff, EnrichmentRunner,
    ProgressCallback,
};
use crate::models::{EnricherRunState, EnrichmentResult, EnrichmentTask, TaskStatus};
use crate::store::TeamStore;

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Task validation and lookup errors.
///
/// These are rejected synchronously; nothing past task creation ever
/// surfaces as an error — run failures land in the task record itself.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unknown scraper: {0}")]
    UnknownScraper(String),

    #[error("no enrichers requested")]
    NoEnrichers,

    #[error("unknown enricher: {0}")]
    UnknownEnricher(String),

    #[error("no dataset for scraper '{0}'; run the scraper first")]
    MissingDataset(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task {0} is already running")]
    AlreadyRunning(String),

    #[error("task {0} is already finished")]
    AlreadyTerminal(String),

    #[error("diff is only available for completed tasks (task {0} is {1})")]
    DiffUnavailable(String, &'static str),
}

/// Task listing with aggregate counts.
#[derive(Debug, serde::Serialize)]
pub struct TaskList {
    pub tasks: Vec<EnrichmentTask>,
    pub active_count: usize,
    pub total_count: usize,
}

#[derive(Default)]
struct OrchestratorInner {
    active: HashMap<String, EnrichmentTask>,
    /// Terminal tasks, newest first, capped at the history limit.
    history: VecDeque<EnrichmentTask>,
    /// Per-task subscriber queues. Unbounded: the producer never blocks;
    /// a disconnected subscriber is pruned at the next notification.
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<EnrichmentTask>>>,
    handles: HashMap<String, JoinHandle<()>>,
}

/// Drives enrichment tasks over stored datasets.
pub struct TaskOrchestrator {
    registry: Arc<EnricherRegistry>,
    store: Arc<TeamStore>,
    defaults: EnricherConfig,
    history_limit: usize,
    inner: Mutex<OrchestratorInner>,
}

impl TaskOrchestrator {
    pub fn new(
        registry: Arc<EnricherRegistry>,
        store: Arc<TeamStore>,
        defaults: EnricherConfig,
    ) -> Self {
        Self {
            registry,
            store,
            defaults,
            history_limit: DEFAULT_HISTORY_LIMIT,
            inner: Mutex::new(OrchestratorInner::default()),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    fn inner(&self) -> MutexGuard<'_, OrchestratorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and create a new pending task.
    ///
    /// Rejects an empty enricher list, unregistered enricher ids, and a
    /// missing dataset; the task is never created in those cases.
    pub fn create_task(
        &self,
        scraper_id: &str,
        scraper_name: &str,
        enricher_ids: Vec<String>,
    ) -> Result<EnrichmentTask, TaskError> {
        if enricher_ids.is_empty() {
            return Err(TaskError::NoEnrichers);
        }
        for id in &enricher_ids {
            if !self.registry.contains(id) {
                return Err(TaskError::UnknownEnricher(id.clone()));
            }
        }
        let teams = self
            .store
            .load_teams(scraper_id)
            .map_err(|_| TaskError::MissingDataset(scraper_id.to_string()))?;

        let task = EnrichmentTask::new(scraper_id, scraper_name, enricher_ids, teams.len());
        info!(task_id = %task.id, scraper = scraper_id, "created enrichment task");

        self.inner().active.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    /// Begin processing a pending task in the background.
    pub fn start_task(self: Arc<Self>, task_id: &str) -> Result<(), TaskError> {
        {
            let inner = self.inner();
            let task = inner
                .active
                .get(task_id)
                .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
            match task.status {
                TaskStatus::Pending => {}
                TaskStatus::Running => {
                    return Err(TaskError::AlreadyRunning(task_id.to_string()))
                }
                _ => return Err(TaskError::AlreadyTerminal(task_id.to_string())),
            }
        }

        let orchestrator = Arc::clone(&self);
        let id = task_id.to_string();
        let handle = tokio::spawn(async move {
            orchestrator.run_task_loop(id).await;
        });

        // Only track the handle while the task is still active (the loop
        // may already have finished for a trivially failing task)
        let mut inner = self.inner();
        if inner.active.contains_key(task_id) {
            inner.handles.insert(task_id.to_string(), handle);
        }
        Ok(())
    }

    /// Convenience: validate, create, and immediately start a task.
    pub fn submit(
        self: Arc<Self>,
        scraper_id: &str,
        scraper_name: &str,
        enricher_ids: Vec<String>,
    ) -> Result<EnrichmentTask, TaskError> {
        let task = self.create_task(scraper_id, scraper_name, enricher_ids)?;
        Arc::clone(&self).start_task(&task.id)?;
        Ok(task)
    }

    /// The spawned run loop: sequences enrichers strictly one after the
    /// other over the task's dataset.
    async fn run_task_loop(self: Arc<Self>, task_id: String) {
        let (scraper_id, enricher_ids) = {
            let inner = self.inner();
            let Some(task) = inner.active.get(&task_id) else {
                return;
            };
            (task.scraper_id.clone(), task.enricher_ids.clone())
        };

        let mut records = match self.store.load_teams(&scraper_id) {
            Ok(records) => records,
            Err(err) => {
                self.finish_task(&task_id, Some(err.to_string()), None);
                return;
            }
        };

        // Mark running and capture the diff baseline in one step, so no
        // enricher can touch a record before it is snapshotted
        {
            let mut inner = self.inner();
            let Some(task) = inner.active.get_mut(&task_id) else {
                return;
            };
            task.mark_running();
            task.snapshot = Some(
                records
                    .iter()
                    .map(|record| (record.name.clone(), record.field_map()))
                    .collect(),
            );
            let snapshot = task.clone();
            Self::notify(&mut inner, &snapshot);
        }

        let total = records.len();

        for enricher_id in &enricher_ids {
            let Some(enricher) = self.registry.create(enricher_id, self.defaults.clone()) else {
                // Defensive: ids are validated at creation, but a task can
                // outlive a registry rebuild
                self.fail_enricher(&task_id, enricher_id, format!("unknown enricher: {enricher_id}"));
                continue;
            };

            if !enricher.is_available() {
                self.fail_enricher(
                    &task_id,
                    enricher_id,
                    format!(
                        "Enricher {} is not available (missing configuration)",
                        enricher.name()
                    ),
                );
                continue;
            }

            self.begin_enricher(&task_id, enricher_id, total);

            let progress: ProgressCallback = {
                let orchestrator = Arc::clone(&self);
                let task_id = task_id.clone();
                let enricher_id = enricher_id.clone();
                Box::new(move |processed, enriched, _total| {
                    orchestrator.update_progress(&task_id, &enricher_id, processed, enriched);
                })
            };

            let result = EnrichmentRunner::new(enricher.as_ref())
                .run(&mut records, Some(&progress))
                .await;

            if result.success {
                self.complete_enricher(&task_id, enricher_id, &result);
            } else {
                // Run-level failure: the whole task fails; enrichers not
                // yet started stay pending inside the terminal record
                let error = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "enrichment failed".to_string());
                self.fail_enricher(&task_id, enricher_id, error.clone());
                self.finish_task(&task_id, Some(error), None);
                return;
            }
        }

        let snapshot = {
            let inner = self.inner();
            inner
                .active
                .get(&task_id)
                .and_then(|task| task.snapshot.clone())
        };
        let diff = snapshot.map(|snapshot| compute_diff(&snapshot, &records));

        if let Err(err) = self.store.save_teams(&scraper_id, &records) {
            self.finish_task(&task_id, Some(format!("failed to save dataset: {err}")), None);
            return;
        }

        self.finish_task(&task_id, None, diff);
    }

    /// Cancel a non-terminal task.
    ///
    /// The run loop is aborted at its next suspension point; mutations
    /// already applied by completed enrichers are not undone.
    pub fn cancel(&self, task_id: &str) -> Result<EnrichmentTask, TaskError> {
        let mut inner = self.inner();

        if let Some(mut task) = inner.active.remove(task_id) {
            task.mark_cancelled();
            warn!(task_id, "enrichment task cancelled");
            Self::notify(&mut inner, &task);
            inner.subscribers.remove(task_id);
            if let Some(handle) = inner.handles.remove(task_id) {
                handle.abort();
            }
            inner.history.push_front(task.clone());
            inner.history.truncate(self.history_limit);
            return Ok(task);
        }

        if inner.history.iter().any(|task| task.id == task_id) {
            Err(TaskError::AlreadyTerminal(task_id.to_string()))
        } else {
            Err(TaskError::NotFound(task_id.to_string()))
        }
    }

    /// Look up a task in the active set, then in history.
    pub fn get_task(&self, task_id: &str) -> Option<EnrichmentTask> {
        let inner = self.inner();
        inner
            .active
            .get(task_id)
            .cloned()
            .or_else(|| inner.history.iter().find(|task| task.id == task_id).cloned())
    }

    /// Fetch a completed task's diff.
    pub fn get_diff(&self, task_id: &str) -> Result<EnrichmentDiff, TaskError> {
        let task = self
            .get_task(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        if task.status != TaskStatus::Completed {
            return Err(TaskError::DiffUnavailable(
                task_id.to_string(),
                task.status.as_str(),
            ));
        }
        task.diff
            .ok_or_else(|| TaskError::DiffUnavailable(task_id.to_string(), "completed"))
    }

    /// List tasks, optionally only the active set.
    pub fn list_tasks(&self, active_only: bool) -> TaskList {
        let inner = self.inner();

        let mut tasks: Vec<EnrichmentTask> = inner.active.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let active_count = tasks.len();

        if !active_only {
            tasks.extend(inner.history.iter().cloned());
        }

        TaskList {
            total_count: active_count + inner.history.len(),
            active_count,
            tasks,
        }
    }

    /// Subscribe to a task's state snapshots.
    ///
    /// The receiver gets every snapshot pushed after subscribing; the
    /// channel closes once the task reaches a terminal state. Unsubscribe
    /// by dropping the receiver.
    pub fn subscribe(
        &self,
        task_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<EnrichmentTask>, TaskError> {
        let mut inner = self.inner();
        if inner.active.contains_key(task_id) {
            let (tx, rx) = mpsc::unbounded_channel();
            inner
                .subscribers
                .entry(task_id.to_string())
                .or_default()
                .push(tx);
            Ok(rx)
        } else if inner.history.iter().any(|task| task.id == task_id) {
            Err(TaskError::AlreadyTerminal(task_id.to_string()))
        } else {
            Err(TaskError::NotFound(task_id.to_string()))
        }
    }

    fn notify(inner: &mut OrchestratorInner, task: &EnrichmentTask) {
        if let Some(subscribers) = inner.subscribers.get_mut(&task.id) {
            subscribers.retain(|tx| tx.send(task.clone()).is_ok());
        }
    }

    fn begin_enricher(&self, task_id: &str, enricher_id: &str, total: usize) {
        let mut inner = self.inner();
        let Some(task) = inner.active.get_mut(task_id) else {
            return;
        };
        if let Some(slot) = task.progress_mut(enricher_id) {
            slot.status = EnricherRunState::Running;
            slot.started_at = Some(chrono::Utc::now());
            slot.total = total;
        }
        let snapshot = task.clone();
        Self::notify(&mut inner, &snapshot);
    }

    fn update_progress(&self, task_id: &str, enricher_id: &str, processed: usize, enriched: usize) {
        let mut inner = self.inner();
        let Some(task) = inner.active.get_mut(task_id) else {
            return;
        };
        if let Some(slot) = task.progress_mut(enricher_id) {
            slot.processed = processed;
            slot.enriched = enriched;
        }
        task.recompute_enriched();
        let snapshot = task.clone();
        Self::notify(&mut inner, &snapshot);
    }

    fn complete_enricher(&self, task_id: &str, enricher_id: &str, result: &EnrichmentResult) {
        let mut inner = self.inner();
        let Some(task) = inner.active.get_mut(task_id) else {
            return;
        };
        if let Some(slot) = task.progress_mut(enricher_id) {
            slot.status = EnricherRunState::Completed;
            slot.processed = result.teams_processed;
            slot.enriched = result.teams_enriched;
            slot.completed_at = Some(chrono::Utc::now());
            slot.duration_ms = Some(result.duration_ms);
        }
        task.recompute_enriched();
        let snapshot = task.clone();
        Self::notify(&mut inner, &snapshot);
    }

    fn fail_enricher(&self, task_id: &str, enricher_id: &str, error: String) {
        warn!(task_id, enricher_id, "enricher slot failed: {error}");
        let mut inner = self.inner();
        let Some(task) = inner.active.get_mut(task_id) else {
            return;
        };
        if let Some(slot) = task.progress_mut(enricher_id) {
            slot.status = EnricherRunState::Failed;
            slot.error = Some(error);
            slot.completed_at = Some(chrono::Utc::now());
        }
        task.recompute_enriched();
        let snapshot = task.clone();
        Self::notify(&mut inner, &snapshot);
    }

    /// Move a task from the active set into bounded history with its
    /// terminal status.
    fn finish_task(&self, task_id: &str, error: Option<String>, diff: Option<EnrichmentDiff>) {
        let mut inner = self.inner();
        let Some(mut task) = inner.active.remove(task_id) else {
            return;
        };
        task.diff = diff;
        task.mark_completed(error);
        info!(task_id, status = task.status.as_str(), "enrichment task finished");
        Self::notify(&mut inner, &task);
        inner.subscribers.remove(task_id);
        inner.handles.remove(task_id);
        inner.history.push_front(task);
        inner.history.truncate(self.history_limit);
    }

    #[cfg(test)]
    pub(crate) fn insert_task_for_test(&self, task: EnrichmentTask) {
        self.inner().active.insert(task.id.clone(), task);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::bail;
    use async_trait::async_trait;

    use super::*;
    use crate::enrich::{EnrichOutcome, Enricher};
    use crate::models::TeamRecord;

    /// Sets `city_population` when missing.
    struct FillPopulation {
        config: EnricherConfig,
        delay: Duration,
    }

    impl FillPopulation {
        fn new(config: EnricherConfig) -> Self {
            Self {
                config,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Enricher for FillPopulation {
        fn id(&self) -> &'static str {
            "geo"
        }
        fn name(&self) -> &'static str {
            "Geo Stub"
        }
        fn description(&self) -> &'static str {
            "Sets population"
        }
        fn fields_added(&self) -> &'static [&'static str] {
            &["city_population"]
        }
        fn config(&self) -> &EnricherConfig {
            &self.config
        }

        async fn enrich_one(&self, record: &mut TeamRecord) -> anyhow::Result<EnrichOutcome> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if record.city_population.is_none() {
                record.city_population = Some(750_000);
                Ok(EnrichOutcome::changed(&["city_population"]))
            } else {
                Ok(EnrichOutcome::NoChange)
            }
        }
    }

    /// Requires `city_population` to be present (sequencing witness), then
    /// sets `followers_x`.
    struct RequirePopulation {
        config: EnricherConfig,
    }

    impl RequirePopulation {
        fn new(config: EnricherConfig) -> Self {
            Self { config }
        }
    }

    #[async_trait]
    impl Enricher for RequirePopulation {
        fn id(&self) -> &'static str {
            "social"
        }
        fn name(&self) -> &'static str {
            "Social Stub"
        }
        fn description(&self) -> &'static str {
            "Requires population first"
        }
        fn fields_added(&self) -> &'static [&'static str] {
            &["followers_x"]
        }
        fn config(&self) -> &EnricherConfig {
            &self.config
        }

        async fn enrich_one(&self, record: &mut TeamRecord) -> anyhow::Result<EnrichOutcome> {
            if record.city_population.is_none() {
                bail!("population missing for {}", record.name);
            }
            if record.followers_x.is_none() {
                record.followers_x = Some(1_000);
                Ok(EnrichOutcome::changed(&["followers_x"]))
            } else {
                Ok(EnrichOutcome::NoChange)
            }
        }
    }

    /// Reports unavailable.
    struct Unavailable {
        config: EnricherConfig,
    }

    impl Unavailable {
        fn new(config: EnricherConfig) -> Self {
            Self { config }
        }
    }

    #[async_trait]
    impl Enricher for Unavailable {
        fn id(&self) -> &'static str {
            "ghost"
        }
        fn name(&self) -> &'static str {
            "Ghost"
        }
        fn description(&self) -> &'static str {
            "Never available"
        }
        fn fields_added(&self) -> &'static [&'static str] {
            &["stadium_name"]
        }
        fn config(&self) -> &EnricherConfig {
            &self.config
        }
        fn is_available(&self) -> bool {
            false
        }

        async fn enrich_one(&self, _record: &mut TeamRecord) -> anyhow::Result<EnrichOutcome> {
            bail!("should never run");
        }
    }

    /// Fails during pre-enrich (run-level failure).
    struct ExplodingSetup {
        config: EnricherConfig,
    }

    impl ExplodingSetup {
        fn new(config: EnricherConfig) -> Self {
            Self { config }
        }
    }

    #[async_trait]
    impl Enricher for ExplodingSetup {
        fn id(&self) -> &'static str {
            "exploder"
        }
        fn name(&self) -> &'static str {
            "Exploder"
        }
        fn description(&self) -> &'static str {
            "Fails setup"
        }
        fn fields_added(&self) -> &'static [&'static str] {
            &["sponsors"]
        }
        fn config(&self) -> &EnricherConfig {
            &self.config
        }

        async fn pre_enrich(&self, _records: &[TeamRecord]) -> anyhow::Result<()> {
            bail!("setup exploded");
        }

        async fn enrich_one(&self, _record: &mut TeamRecord) -> anyhow::Result<EnrichOutcome> {
            Ok(EnrichOutcome::NoChange)
        }
    }

    fn stub_registry() -> EnricherRegistry {
        let mut registry = EnricherRegistry::new();
        registry.register(FillPopulation::new);
        registry.register(RequirePopulation::new);
        registry.register(Unavailable::new);
        registry.register(ExplodingSetup::new);
        registry
    }

    fn record(name: &str) -> TeamRecord {
        TeamRecord {
            name: name.to_string(),
            region: "Testville".to_string(),
            league: "Test League".to_string(),
            target_demographic: "Fans".to_string(),
            official_url: "https://example.com".to_string(),
            category: "TEST".to_string(),
            ..Default::default()
        }
    }

    /// Orchestrator over a temp-dir store seeded with a 3-team nfl dataset.
    fn orchestrator() -> (Arc<TaskOrchestrator>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TeamStore::new(dir.path()));
        store
            .save_teams("nfl", &[record("Alpha"), record("Bravo"), record("Charlie")])
            .unwrap();

        let orchestrator = Arc::new(TaskOrchestrator::new(
            Arc::new(stub_registry()),
            store,
            EnricherConfig {
                retry_delay: Duration::from_millis(1),
                batch_delay: Duration::ZERO,
                max_retries: 1,
                ..Default::default()
            },
        ));
        (orchestrator, dir)
    }

    async fn wait_terminal(
        mut rx: mpsc::UnboundedReceiver<EnrichmentTask>,
    ) -> Option<EnrichmentTask> {
        let mut last = None;
        while let Some(task) = rx.recv().await {
            let terminal = task.is_terminal();
            last = Some(task);
            if terminal {
                break;
            }
        }
        last
    }

    #[tokio::test]
    async fn test_create_validates_request() {
        let (orchestrator, _dir) = orchestrator();

        let err = orchestrator.create_task("nfl", "NFL", Vec::new()).unwrap_err();
        assert!(matches!(err, TaskError::NoEnrichers));

        let err = orchestrator
            .create_task("nfl", "NFL", vec!["bogus".to_string()])
            .unwrap_err();
        assert!(matches!(err, TaskError::UnknownEnricher(_)));

        let err = orchestrator
            .create_task("mls", "MLS", vec!["geo".to_string()])
            .unwrap_err();
        assert!(matches!(err, TaskError::MissingDataset(_)));
    }

    #[tokio::test]
    async fn test_task_lifecycle_completed() {
        // P7 + end-to-end scenario
        let (orchestrator, _dir) = orchestrator();

        let task = orchestrator
            .create_task("nfl", "NFL Teams", vec!["geo".to_string(), "social".to_string()])
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.total_teams, 3);
        assert_eq!(task.progress["geo"].status, EnricherRunState::Pending);
        assert_eq!(task.progress["social"].status, EnricherRunState::Pending);

        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();

        let done = wait_terminal(rx).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress["geo"].status, EnricherRunState::Completed);
        assert_eq!(done.progress["social"].status, EnricherRunState::Completed);
        assert_eq!(
            done.teams_enriched,
            done.progress["geo"].enriched + done.progress["social"].enriched
        );

        let diff = done.diff.expect("completed task carries a diff");
        assert!(diff.teams_changed <= 3);
        assert_eq!(diff.teams_changed, 3);

        // moved out of the active set into history
        let listing = orchestrator.list_tasks(true);
        assert_eq!(listing.active_count, 0);
        assert!(orchestrator.get_task(&done.id).is_some());

        // enriched dataset was persisted
        let saved = orchestrator.store.load_teams("nfl").unwrap();
        for team in &saved {
            assert!(team.has_enrichment("geo"));
            assert!(team.has_enrichment("social"));
            assert_eq!(team.city_population, Some(750_000));
            assert_eq!(team.followers_x, Some(1_000));
        }
    }

    #[tokio::test]
    async fn test_sequential_enrichers_never_overlap() {
        // P9: the second enricher asserts the first's field is populated
        let (orchestrator, _dir) = orchestrator();

        let task = orchestrator
            .create_task("nfl", "NFL", vec!["geo".to_string(), "social".to_string()])
            .unwrap();
        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();

        let done = wait_terminal(rx).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        // all 3 social enrichments succeeded, so social never saw a record
        // geo had not yet populated
        assert_eq!(done.progress["social"].enriched, 3);
    }

    #[tokio::test]
    async fn test_unavailable_enricher_does_not_abort_task() {
        let (orchestrator, _dir) = orchestrator();

        let task = orchestrator
            .create_task("nfl", "NFL", vec!["ghost".to_string(), "geo".to_string()])
            .unwrap();
        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();

        let done = wait_terminal(rx).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress["ghost"].status, EnricherRunState::Failed);
        assert!(done.progress["ghost"].error.is_some());
        assert_eq!(done.progress["geo"].status, EnricherRunState::Completed);
        assert_eq!(done.progress["geo"].enriched, 3);
    }

    #[tokio::test]
    async fn test_run_level_failure_fails_task_and_leaves_rest_pending() {
        let (orchestrator, _dir) = orchestrator();

        let task = orchestrator
            .create_task("nfl", "NFL", vec!["exploder".to_string(), "geo".to_string()])
            .unwrap();
        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();

        let done = wait_terminal(rx).await.unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.error.as_deref().unwrap().contains("setup exploded"));
        assert_eq!(done.progress["exploder"].status, EnricherRunState::Failed);
        assert_eq!(done.progress["geo"].status, EnricherRunState::Pending);
        assert!(done.diff.is_none());
    }

    #[tokio::test]
    async fn test_unknown_enricher_slot_fails_but_task_continues() {
        let (orchestrator, _dir) = orchestrator();

        // Bypass creation-time validation to exercise the defensive path
        let task = EnrichmentTask::new(
            "nfl",
            "NFL",
            vec!["vanished".to_string(), "geo".to_string()],
            3,
        );
        let task_id = task.id.clone();
        orchestrator.insert_task_for_test(task);

        let rx = orchestrator.subscribe(&task_id).unwrap();
        Arc::clone(&orchestrator).start_task(&task_id).unwrap();

        let done = wait_terminal(rx).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress["vanished"].status, EnricherRunState::Failed);
        assert_eq!(done.progress["geo"].status, EnricherRunState::Completed);
    }

    #[tokio::test]
    async fn test_cancel_running_task() {
        // P8: a running task transitions to CANCELLED and moves to history
        let (orchestrator, _dir) = orchestrator();

        // Make the run slow enough to catch mid-flight
        let slow = Arc::new(TaskOrchestrator::new(
            Arc::new({
                let mut registry = EnricherRegistry::new();
                registry.register(|config| {
                    let mut stub = FillPopulation::new(config);
                    stub.delay = Duration::from_millis(200);
                    stub
                });
                registry
            }),
            Arc::clone(&orchestrator.store),
            EnricherConfig::default(),
        ));

        let task = slow
            .create_task("nfl", "NFL", vec!["geo".to_string()])
            .unwrap();
        Arc::clone(&slow).start_task(&task.id).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cancelled = slow.cancel(&task.id).unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);

        let listing = slow.list_tasks(false);
        assert_eq!(listing.active_count, 0);
        assert_eq!(listing.tasks[0].status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_terminal_task_is_rejected() {
        // P8: cancelling a finished task is an error
        let (orchestrator, _dir) = orchestrator();

        let task = orchestrator
            .create_task("nfl", "NFL", vec!["geo".to_string()])
            .unwrap();
        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();
        wait_terminal(rx).await.unwrap();

        let err = orchestrator.cancel(&task.id).unwrap_err();
        assert!(matches!(err, TaskError::AlreadyTerminal(_)));

        let err = orchestrator.cancel("missing").unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_diff_only_for_completed() {
        let (orchestrator, _dir) = orchestrator();

        let task = orchestrator
            .create_task("nfl", "NFL", vec!["geo".to_string()])
            .unwrap();
        let err = orchestrator.get_diff(&task.id).unwrap_err();
        assert!(matches!(err, TaskError::DiffUnavailable(_, "pending")));

        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();
        wait_terminal(rx).await.unwrap();

        let diff = orchestrator.get_diff(&task.id).unwrap();
        assert_eq!(diff.teams_changed, 3);
        assert_eq!(diff.fields_added, 3);
    }

    #[tokio::test]
    async fn test_history_is_bounded_newest_first() {
        let (_seed, dir) = orchestrator();
        let orchestrator = Arc::new(
            TaskOrchestrator::new(
                Arc::new(stub_registry()),
                Arc::new(TeamStore::new(dir.path())),
                EnricherConfig::default(),
            )
            .with_history_limit(2),
        );

        let mut ids = Vec::new();
        for _ in 0..3 {
            let task = orchestrator
                .create_task("nfl", "NFL", vec!["geo".to_string()])
                .unwrap();
            let rx = orchestrator.subscribe(&task.id).unwrap();
            Arc::clone(&orchestrator).start_task(&task.id).unwrap();
            wait_terminal(rx).await.unwrap();
            ids.push(task.id);
        }

        let listing = orchestrator.list_tasks(false);
        assert_eq!(listing.tasks.len(), 2);
        assert_eq!(listing.total_count, 2);
        // newest first; the oldest task was evicted
        assert_eq!(listing.tasks[0].id, ids[2]);
        assert_eq!(listing.tasks[1].id, ids[1]);
        assert!(orchestrator.get_task(&ids[0]).is_none());
    }

    #[tokio::test]
    async fn test_duplicate_team_names_last_wins_in_snapshot() {
        // Snapshot is keyed by team name; with duplicate names the later
        // record overwrites the earlier one, so the first record diffs
        // against the second's before-state (known upstream ambiguity)
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TeamStore::new(dir.path()));
        let mut first = record("Twin");
        first.region = "Alpha City".to_string();
        let mut second = record("Twin");
        second.region = "Beta City".to_string();
        store.save_teams("dup", &[first, second]).unwrap();

        let orchestrator = Arc::new(TaskOrchestrator::new(
            Arc::new(stub_registry()),
            store,
            EnricherConfig::default(),
        ));

        let task = orchestrator
            .create_task("dup", "Dup", vec!["geo".to_string()])
            .unwrap();
        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();
        let done = wait_terminal(rx).await.unwrap();

        let diff = done.diff.unwrap();
        // the first record's region reads as "modified" against the
        // second record's snapshot
        assert!(diff.team_diffs.iter().any(|team| {
            team.changes.iter().any(|change| {
                change.field == "region"
                    && change.change_type == crate::enrich::ChangeType::Modified
            })
        }));
    }

    #[tokio::test]
    async fn test_subscribe_terminal_task_is_rejected() {
        let (orchestrator, _dir) = orchestrator();

        let task = orchestrator
            .create_task("nfl", "NFL", vec!["geo".to_string()])
            .unwrap();
        let rx = orchestrator.subscribe(&task.id).unwrap();
        Arc::clone(&orchestrator).start_task(&task.id).unwrap();
        wait_terminal(rx).await.unwrap();

        let err = orchestrator.subscribe(&task.id).unwrap_err();
        assert!(matches!(err, TaskError::AlreadyTerminal(_)));
        let err = orchestrator.subscribe("missing").unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }
}
