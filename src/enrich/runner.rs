//! Shared batch driver applying one enricher to a batch of records.
//!
//! Partitions records into fixed-size batches, runs up to `max_concurrent`
//! item operations at a time within a batch (batches themselves are strictly
//! sequential), retries failed items with linear backoff, and isolates
//! per-item failures so one bad record never aborts the batch. The pause
//! between batches is politeness pacing toward external services, not a
//! performance knob.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::enrich::{EnrichOutcome, Enricher, EnricherConfig, ProgressCallback};
use crate::models::{EnrichmentResult, TeamRecord};

/// Per-enricher driver. Borrow an enricher, apply it to a batch.
pub struct EnrichmentRunner<'a> {
    enricher: &'a dyn Enricher,
}

impl<'a> EnrichmentRunner<'a> {
    pub fn new(enricher: &'a dyn Enricher) -> Self {
        Self { enricher }
    }

    /// Apply the enricher to `records`, invoking `progress` with
    /// (processed, enriched, total) after each item completes.
    ///
    /// An empty batch is success with zero processed. An unavailable
    /// enricher returns immediately with `success=false` and no record
    /// mutation. Per-item failures are logged and isolated; only a failure
    /// in `pre_enrich`/`post_enrich` makes the overall result unsuccessful.
    pub async fn run(
        &self,
        records: &mut [TeamRecord],
        progress: Option<&ProgressCallback>,
    ) -> EnrichmentResult {
        let started = Utc::now();
        let timer = Instant::now();
        let name = self.enricher.name();

        if records.is_empty() {
            return EnrichmentResult::success(name, 0, 0, 0, started);
        }

        if !self.enricher.is_available() {
            return EnrichmentResult::failure(
                name,
                0,
                0,
                started,
                format!("Enricher {name} is not available (missing configuration)"),
            );
        }

        let total = records.len();
        let config = self.enricher.config().clone();

        if let Err(err) = self.enricher.pre_enrich(records).await {
            warn!(enricher = self.enricher.id(), "pre-enrich failed: {err:#}");
            return EnrichmentResult::failure(
                name,
                0,
                timer.elapsed().as_millis() as u64,
                started,
                format!("{err:#}"),
            );
        }

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        let processed = AtomicUsize::new(0);
        let enriched = AtomicUsize::new(0);

        let batch_size = config.batch_size.max(1);
        let batch_count = total.div_ceil(batch_size);

        for (batch_index, batch) in records.chunks_mut(batch_size).enumerate() {
            let processed = &processed;
            let enriched = &enriched;
            let config = &config;

            let items: Vec<_> = batch
                .iter_mut()
                .map(|record| {
                    let semaphore = Arc::clone(&semaphore);
                    async move {
                        let _permit = semaphore.acquire().await.ok();

                        match Self::enrich_with_retry(self.enricher, record, config).await {
                            Ok(outcome) => {
                                if outcome.is_changed() {
                                    record.apply_enrichment(self.enricher.id());
                                    enriched.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                            Err(err) => {
                                warn!(
                                    enricher = self.enricher.id(),
                                    team = %record.name,
                                    "enrichment failed: {err:#}"
                                );
                            }
                        }

                        let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(callback) = progress {
                            callback(done, enriched.load(Ordering::SeqCst), total);
                        }
                    }
                })
                .collect();

            futures::future::join_all(items).await;

            // Politeness pause, skipped after the final batch
            if batch_index + 1 < batch_count && !config.batch_delay.is_zero() {
                tokio::time::sleep(config.batch_delay).await;
            }
        }

        let enriched_count = enriched.load(Ordering::SeqCst);

        if let Err(err) = self.enricher.post_enrich(records).await {
            warn!(enricher = self.enricher.id(), "post-enrich failed: {err:#}");
            let mut result = EnrichmentResult::failure(
                name,
                total,
                timer.elapsed().as_millis() as u64,
                started,
                format!("{err:#}"),
            );
            result.teams_enriched = enriched_count;
            return result;
        }

        info!(
            enricher = self.enricher.id(),
            processed = total,
            enriched = enriched_count,
            "enrichment run finished"
        );

        EnrichmentResult::success(
            name,
            total,
            enriched_count,
            timer.elapsed().as_millis() as u64,
            started,
        )
    }

    /// Run `enrich_one` for a single record with up to `max_retries` total
    /// attempts and a linearly increasing backoff between them.
    async fn enrich_with_retry(
        enricher: &dyn Enricher,
        record: &mut TeamRecord,
        config: &EnricherConfig,
    ) -> Result<EnrichOutcome> {
        let attempts = config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match enricher.enrich_one(record).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    if attempt < attempts {
                        debug!(
                            enricher = enricher.id(),
                            team = %record.name,
                            attempt,
                            "retrying after error: {err:#}"
                        );
                        tokio::time::sleep(config.retry_delay * attempt as u32).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("enrichment failed")))
    }
}
