//! Merges converted files into their target site models.
//!
//! [`AggregationIntegrator`] is the shared queue of converted files. An [`IntegratorWorker`]
//! claims one target project through the [`IntegrationScheduler`], merges up to its batch size of
//! queued tasks for that project, and releases the claim in
//! [`IntegratorWorker::complete_task_processing`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregation::scheduler::{AdmissionToken, IntegrationScheduler};
use crate::aggregation::task::AggregationTask;
use crate::error::{Error, Result};
use crate::execution::epoch_processor::FILE_MACHINE_INDEX;
use crate::registry::site_models::SiteModels;
use crate::storage::site_model::SiteModel;

#[derive(Debug, Default)]
pub struct AggregationIntegrator {
    tasks: Mutex<VecDeque<AggregationTask>>,
}

impl AggregationIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task_to_process_list(&self, task: AggregationTask) {
        debug!(file = %task.file_name, project = %task.target_project, "Queued aggregation task");
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn count_for(&self, project: Uuid) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|task| task.target_project == project)
            .count()
    }

    /// Remove every queued task for `project`, oldest first
    pub fn drain_tasks_for(&self, project: Uuid) -> Vec<AggregationTask> {
        self.take_tasks_for(project, usize::MAX)
    }

    /// Put tasks back at the front of the queue in their original order
    fn restore_tasks(&self, taken: Vec<AggregationTask>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in taken.into_iter().rev() {
            tasks.push_front(task);
        }
    }

    /// Remove up to `max_count` tasks for `project`, oldest first
    fn take_tasks_for(&self, project: Uuid, max_count: usize) -> Vec<AggregationTask> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut taken = Vec::new();
        let mut remaining = VecDeque::with_capacity(tasks.len());
        while let Some(task) = tasks.pop_front() {
            if task.target_project == project && taken.len() < max_count {
                taken.push(task);
            } else {
                remaining.push_back(task);
            }
        }
        *tasks = remaining;
        taken
    }
}

/// Outcome of merging one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTask {
    pub file_name: String,
    pub machine_id: Uuid,
    pub machine_index: u16,
    pub created_machine: bool,
    pub cell_passes_integrated: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationSummary {
    pub project: Uuid,
    pub tasks_processed: usize,
    /// Tasks that could not be merged and were dropped
    pub tasks_failed: usize,
    pub cell_passes_integrated: u64,
    pub epochs_processed: u64,
    pub machines_created: usize,
    pub persisted: bool,
}

pub struct IntegratorWorker {
    integrator: Arc<AggregationIntegrator>,
    site_models: Arc<SiteModels>,
    target: Uuid,
    max_batch: usize,
    token: AdmissionToken,
    summary: AggregationSummary,
}

impl IntegratorWorker {
    /// Claim `target`. Fails with [`Error::TargetBusy`] if another worker holds it.
    pub fn new(
        integrator: Arc<AggregationIntegrator>,
        site_models: Arc<SiteModels>,
        scheduler: &IntegrationScheduler,
        target: Uuid,
        max_batch: usize,
    ) -> Result<Self> {
        let token = scheduler.try_admit(target).ok_or(Error::TargetBusy(target))?;
        Ok(Self::with_token(integrator, site_models, token, max_batch))
    }

    /// A worker for a project that has already been claimed
    pub fn with_token(
        integrator: Arc<AggregationIntegrator>,
        site_models: Arc<SiteModels>,
        token: AdmissionToken,
        max_batch: usize,
    ) -> Self {
        let target = token.project();
        IntegratorWorker {
            integrator,
            site_models,
            target,
            max_batch: max_batch.max(1),
            token,
            summary: AggregationSummary {
                project: target,
                ..AggregationSummary::default()
            },
        }
    }

    pub fn target(&self) -> Uuid {
        self.target
    }

    /// Take up to `max_count` queued tasks (never more than the worker's batch size) and merge
    /// them into the target. Returns the number taken.
    ///
    /// A task that cannot be merged leaves the target untouched, is logged and counted in
    /// [`AggregationSummary::tasks_failed`]; the rest of the batch is still merged. If the target
    /// cannot be loaded the taken tasks are put back and the error is returned.
    pub fn process_task(
        &mut self,
        results_out: &mut Vec<ProcessedTask>,
        max_count: usize,
    ) -> Result<usize> {
        let tasks = self.integrator.take_tasks_for(self.target, max_count.min(self.max_batch));
        if tasks.is_empty() {
            return Ok(0);
        }

        let shared = match self.site_models.get_or_create(self.target) {
            Ok(shared) => shared,
            Err(e) => {
                warn!(
                    project = %self.target,
                    tasks = tasks.len(),
                    error = %e,
                    "Target unavailable"
                );
                self.integrator.restore_tasks(tasks);
                return Err(e);
            }
        };
        let mut model = shared.write().unwrap_or_else(PoisonError::into_inner);

        for task in &tasks {
            let org = task.originating_org_id.as_deref().unwrap_or("");
            match integrate_task(&mut model, task) {
                Ok(processed) => {
                    info!(
                        file = %task.file_name,
                        project = %task.target_project,
                        org,
                        machine = processed.machine_index,
                        cell_passes = processed.cell_passes_integrated,
                        "Integrated TAG file"
                    );
                    self.summary.tasks_processed += 1;
                    self.summary.cell_passes_integrated += processed.cell_passes_integrated;
                    self.summary.epochs_processed += task.conversion.processed_epoch_count;
                    if processed.created_machine {
                        self.summary.machines_created += 1;
                    }
                    results_out.push(processed);
                }
                Err(e) => {
                    warn!(
                        file = %task.file_name,
                        project = %task.target_project,
                        org,
                        error = %e,
                        "TAG file could not be integrated"
                    );
                    self.summary.tasks_failed += 1;
                }
            }
        }
        Ok(tasks.len())
    }

    /// Persist the target if anything was merged, then release the claim on it
    pub fn complete_task_processing(mut self) -> Result<AggregationSummary> {
        if self.summary.tasks_processed == 0 {
            return Ok(self.summary);
        }
        let persisted = match self.site_models.persist(self.target) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(project = %self.target, error = %e, "Site model could not be persisted");
                return Err(e);
            }
        };
        self.summary.persisted = persisted;
        info!(
            project = %self.token.project(),
            tasks = self.summary.tasks_processed,
            cell_passes = self.summary.cell_passes_integrated,
            persisted,
            "Completed aggregation batch"
        );
        Ok(self.summary)
    }
}

fn integrate_task(model: &mut SiteModel, task: &AggregationTask) -> Result<ProcessedTask> {
    let conversion = &task.conversion;
    info!(
        file = %task.file_name,
        project = %task.target_project,
        org = task.originating_org_id.as_deref().unwrap_or(""),
        "Integrating TAG file"
    );
    // The model must not change before this check; nothing after it can fail
    model.grid.check_compatible(&conversion.grid)?;

    // Machine identity
    let source = &conversion.machine;
    let existing = if task.is_john_doe() {
        model.machines.locate_john_doe(&source.hardware_id)
    } else {
        task.asset_id.and_then(|asset| model.machines.locate(asset))
    }
    .map(|machine| machine.internal_index);

    let created_machine = existing.is_none();
    let machine_index = match existing {
        Some(index) => index,
        None => {
            let mut template = source.clone();
            template.is_john_doe = task.is_john_doe();
            template.id = match task.asset_id {
                Some(asset) if !template.is_john_doe => asset,
                _ => Uuid::new_v4(),
            };
            let machine = model.machines.add(&template);
            debug!(
                machine = %machine.id,
                index = machine.internal_index,
                john_doe = machine.is_john_doe,
                "Created machine"
            );
            machine.internal_index
        }
    };
    let mut machine_id = Uuid::nil();
    if let Some(machine) = model.machines.get_mut(machine_index) {
        machine.update_last_known(source.last_known_time, source.last_known_position);
        machine_id = machine.id;
    }

    // Designs first so design events can be remapped, then every event list
    let design_remap = model.designs.merge_from(&conversion.designs);
    model.event_lists_mut(machine_index).merge_from(&conversion.events, &design_remap);

    let machine_remap = HashMap::from([(FILE_MACHINE_INDEX, machine_index)]);
    let cell_passes_integrated = model.grid.integrate(&conversion.grid, &machine_remap)? as u64;
    model.extent.include_extent(&conversion.coverage);

    for run in &conversion.proofing_runs {
        let mut run = run.clone();
        run.machine_index = machine_index;
        model.add_proofing_run(run);
    }

    model.total_processed_cell_passes += conversion.processed_cell_pass_count;
    model.total_processed_epochs += conversion.processed_epoch_count;
    model.processed_tag_file_count += 1;
    model.last_modified = Utc::now();

    Ok(ProcessedTask {
        file_name: task.file_name.clone(),
        machine_id,
        machine_index,
        created_machine,
        cell_passes_integrated,
    })
}
