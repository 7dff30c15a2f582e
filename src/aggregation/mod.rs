//! Aggregation of converted files into site models
//!
//! # Components
//!
//! - **AggregationTask** - A converted file addressed to a target project
//! - **AggregationIntegrator** - Shared queue of tasks awaiting integration
//! - **IntegratorWorker** - Merges a batch of tasks into one target site model
//! - **IntegrationScheduler** - Ensures a single worker per target
//!
//! # Example
//!
//! ```ignore
//! let integrator = Arc::new(AggregationIntegrator::new());
//! integrator.add_task_to_process_list(AggregationTask::new(project, Some(asset), conversion));
//!
//! let mut worker = IntegratorWorker::new(integrator, site_models, &scheduler, project, 20)?;
//! let mut processed = Vec::new();
//! worker.process_task(&mut processed, 20)?;
//! let summary = worker.complete_task_processing()?;
//! ```

pub mod integrator;
pub mod scheduler;
pub mod task;

// Re-export main types for convenience
pub use integrator::{AggregationIntegrator, AggregationSummary, IntegratorWorker, ProcessedTask};
pub use scheduler::{AdmissionToken, IntegrationScheduler};
pub use task::AggregationTask;
