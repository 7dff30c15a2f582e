//! Queueing and batching of submitted files
//!
//! # Components
//!
//! - **BufferQueue** - File contents and submission metadata per queued key
//! - **BufferQueueGrouper** - Batches keys by `(project, asset)` and honours an avoid-list
//! - **IngestionPipeline** - Async driver from files on disk to persisted site models

pub mod buffer_queue;
pub mod grouper;
pub mod pipeline;

// Re-export main types for convenience
pub use buffer_queue::{BufferQueue, BufferQueueEntry, BufferQueueKey};
pub use grouper::BufferQueueGrouper;
pub use pipeline::{IngestionPipeline, PipelineSummary};
