//! Asynchronous ingestion of TAG files from disk.
//!
//! Files are read with `tokio::fs` and queued. Each batch handed out by the grouper is converted
//! in parallel on the rayon pool and merged into its target site model, all inside
//! `spawn_blocking` so the runtime's worker threads never run CPU-bound work.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::aggregation::{
    AggregationIntegrator, AggregationSummary, AggregationTask, IntegrationScheduler,
    IntegratorWorker,
};
use crate::config::SwatheConfig;
use crate::error::{Error, Result};
use crate::execution::converter::TagFileConverter;
use crate::ingest::buffer_queue::{BufferQueue, BufferQueueEntry, BufferQueueKey};
use crate::ingest::grouper::BufferQueueGrouper;
use crate::registry::site_models::SiteModels;

/// Counters for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub files_queued: usize,
    pub files_converted: usize,
    pub files_failed: usize,
    pub batches: Vec<AggregationSummary>,
}

impl PipelineSummary {
    pub fn cell_passes_integrated(&self) -> u64 {
        self.batches.iter().map(|b| b.cell_passes_integrated).sum()
    }

    fn absorb(&mut self, batch: BatchOutcome) {
        self.files_converted += batch.converted;
        self.files_failed += batch.failed;
        if let Some(summary) = batch.summary {
            self.batches.push(summary);
        }
    }
}

struct BatchOutcome {
    converted: usize,
    failed: usize,
    summary: Option<AggregationSummary>,
}

pub struct IngestionPipeline {
    config: SwatheConfig,
    converter: Arc<TagFileConverter>,
    queue: Arc<BufferQueue>,
    grouper: Arc<BufferQueueGrouper>,
    integrator: Arc<AggregationIntegrator>,
    scheduler: IntegrationScheduler,
    site_models: Arc<SiteModels>,
    shutdown: Arc<AtomicBool>,
}

impl IngestionPipeline {
    pub fn new(config: SwatheConfig) -> Self {
        let site_models = Arc::new(SiteModels::with_config(&config));
        Self::with_site_models(config, site_models)
    }

    pub fn with_site_models(config: SwatheConfig, site_models: Arc<SiteModels>) -> Self {
        IngestionPipeline {
            converter: Arc::new(TagFileConverter::new(config.clone())),
            grouper: Arc::new(BufferQueueGrouper::new(config.max_grouped_tag_files)),
            queue: Arc::new(BufferQueue::new()),
            integrator: Arc::new(AggregationIntegrator::new()),
            scheduler: IntegrationScheduler::new(),
            site_models,
            shutdown: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    pub fn site_models(&self) -> &Arc<SiteModels> {
        &self.site_models
    }

    /// Setting the returned flag stops the pipeline before its next batch
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn queued_count(&self) -> usize {
        self.grouper.len()
    }

    /// Queue one file. Returns false if a file with the same key is already queued.
    pub fn enqueue(&self, key: BufferQueueKey, entry: BufferQueueEntry) -> bool {
        if !self.queue.add(key.clone(), entry) {
            debug!(file = %key.file_name, "File already queued");
            return false;
        }
        self.grouper.add(key);
        true
    }

    /// Queue every `.tag` file in `dir` for `project` and process the queue
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        project: Uuid,
        asset: Option<Uuid>,
        treat_as_john_doe: bool,
    ) -> Result<PipelineSummary> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("tag")) {
                paths.push(path);
            }
        }
        paths.sort();
        info!(dir = %dir.display(), files = paths.len(), project = %project, "Ingesting directory");

        let mut files_queued = 0;
        for path in paths {
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let content = tokio::fs::read(&path).await?;
            let mut entry = BufferQueueEntry::new(content);
            entry.treat_as_john_doe = treat_as_john_doe || asset.is_none();
            if self.enqueue(BufferQueueKey::new(&file_name, project, asset), entry) {
                files_queued += 1;
            }
        }

        let mut summary = self.run_until_idle().await?;
        summary.files_queued = files_queued;
        Ok(summary)
    }

    /// Process batches until the grouper is empty or shutdown is requested.
    ///
    /// Each batch's project is claimed when the batch is extracted and stays claimed until the
    /// batch is merged, so concurrent runs on one pipeline never share a target. A batch that
    /// fails is logged and its files are counted as failed; the run continues.
    pub async fn run_until_idle(&self) -> Result<PipelineSummary> {
        let mut summary = PipelineSummary::default();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!(remaining = self.grouper.len(), "Shutdown requested, stopping ingestion");
                break;
            }
            let Some((token, keys)) = self.grouper.extract_admitted(&self.scheduler) else {
                break;
            };
            let project = token.project();

            let items: Vec<(BufferQueueKey, BufferQueueEntry)> = keys
                .into_iter()
                .filter_map(|key| self.queue.take(&key).map(|entry| (key, entry)))
                .collect();
            let file_count = items.len();

            let converter = Arc::clone(&self.converter);
            let integrator = Arc::clone(&self.integrator);
            let site_models = Arc::clone(&self.site_models);
            let max_batch = self.config.max_mapped_tag_files_per_aggregation_epoch;

            let batch = tokio::task::spawn_blocking(move || {
                let worker = IntegratorWorker::with_token(
                    Arc::clone(&integrator),
                    site_models,
                    token,
                    max_batch,
                );
                process_batch(&converter, &integrator, worker, items, max_batch)
            })
            .await;

            match batch {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    let e = Error::Task(e.to_string());
                    warn!(project = %project, files = file_count, error = %e, "Batch aborted");
                    summary.files_failed += file_count;
                }
            }
        }
        Ok(summary)
    }
}

/// Convert, queue and merge one claimed batch. Every file ends up counted as converted or failed.
fn process_batch(
    converter: &TagFileConverter,
    integrator: &AggregationIntegrator,
    mut worker: IntegratorWorker,
    items: Vec<(BufferQueueKey, BufferQueueEntry)>,
    max_batch: usize,
) -> BatchOutcome {
    let project = worker.target();
    let converted: Vec<_> = items
        .into_par_iter()
        .map(|(key, entry)| {
            let span = info_span!(
                "tag_file",
                file = %key.file_name,
                project = %project,
                org = entry.originating_org_id.as_deref().unwrap_or("")
            );
            let result = span.in_scope(|| converter.convert(&key.file_name, &entry.content));
            (key, entry, span, result)
        })
        .collect();

    let mut outcome = BatchOutcome {
        converted: 0,
        failed: 0,
        summary: None,
    };
    let mut queued = 0;
    for (key, entry, span, result) in converted {
        let _entered = span.enter();
        match result {
            Ok(conversion) if conversion.is_success() => {
                let mut task = AggregationTask::new(project, key.asset(), conversion);
                task.treat_as_john_doe |= entry.treat_as_john_doe;
                task.originating_org_id = entry.originating_org_id;
                integrator.add_task_to_process_list(task);
                queued += 1;
            }
            Ok(conversion) => {
                warn!(result = %conversion.read_result, "Skipping unreadable TAG file");
                outcome.failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "Skipping TAG file after processing error");
                outcome.failed += 1;
            }
        }
    }
    if queued == 0 {
        return outcome;
    }

    let mut processed = Vec::new();
    loop {
        match worker.process_task(&mut processed, max_batch) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                let dropped = integrator.drain_tasks_for(project).len();
                warn!(project = %project, files = dropped, error = %e, "Aggregation batch failed");
                outcome.failed += dropped;
                break;
            }
        }
    }

    match worker.complete_task_processing() {
        Ok(summary) => {
            outcome.converted += summary.tasks_processed;
            outcome.failed += summary.tasks_failed;
            outcome.summary = Some(summary);
        }
        Err(e) => {
            // Merged in memory but not saved
            outcome.converted += processed.len();
            warn!(project = %project, error = %e, "Aggregation batch was not persisted");
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let pipeline = IngestionPipeline::new(SwatheConfig::default());
        let summary = pipeline
            .ingest_directory(dir.path(), Uuid::new_v4(), None, true)
            .await
            .unwrap();
        assert_eq!(summary.files_queued, 0);
        assert!(summary.batches.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_leaves_queue_intact() {
        let pipeline = IngestionPipeline::new(SwatheConfig::default());
        let key = BufferQueueKey::new("a.tag", Uuid::new_v4(), None);
        assert!(pipeline.enqueue(key.clone(), BufferQueueEntry::new(vec![0; 32])));
        assert!(!pipeline.enqueue(key, BufferQueueEntry::new(vec![0; 32])));

        pipeline.shutdown_handle().store(true, Ordering::Relaxed);
        let summary = pipeline.run_until_idle().await.unwrap();
        assert_eq!(summary.files_converted, 0);
        assert_eq!(pipeline.queued_count(), 1);
    }
}
