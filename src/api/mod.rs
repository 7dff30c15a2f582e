//! Submission boundary
//!
//! [`TagFileSubmitter`] validates a submitted file, pre-scans it and queues it for ingestion.
//! Every submission is answered with a [`SubmitTagFileResponse`] carrying a result code.

pub mod submission;

// Re-export main types for convenience
pub use submission::{
    SubmitResultCode, SubmitTagFileRequest, SubmitTagFileResponse, TagFileSubmitter,
};
