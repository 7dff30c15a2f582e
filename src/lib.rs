//! # Swathe
//!
//! Swathe is an ingestion engine for machine-telemetry TAG files produced by compaction and
//! earthmoving equipment.
//!
//! Each file is decoded from its nybble-packed, dictionary-tagged value stream, the area swept by
//! the machine's working edge between consecutive epochs is rasterized into grid cells, and the
//! resulting per-file fragments are merged into a long-lived, spatially indexed site model.
//!
//! ## Features
//!
//! - Bit-exact TAG file reader and writer
//! - Epoch state machine with discrete lifecycle events (startup, shutdown, proofing runs)
//! - Swathing rasterizer with time and height interpolation
//! - Single-writer-per-project aggregation into persistent site models
//!
//! ## Example
//!
//! ```rust
//! use swathe::config::SwatheConfig;
//! use swathe::execution::converter::TagFileConverter;
//! use swathe::parsing::tag_file::TagFileWriter;
//!
//! fn example() -> swathe::Result<()> {
//!     let bytes = TagFileWriter::new().finish();
//!     let converter = TagFileConverter::new(SwatheConfig::default());
//!     let result = converter.convert("empty.tag", &bytes)?;
//!     println!("processed {} cell passes", result.processed_cell_pass_count);
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::new_without_default)]

/// Core data structures: nybble codec, geometry and GPS time
pub mod core;

/// Engine configuration
pub mod config;

/// TAG file reading, writing and value matching
pub mod parsing;

/// Per-file processing: epochs, swathing and conversion
pub mod execution;

/// Spatial grid, machines, event lists and site models
pub mod storage;

/// Site-model registry
pub mod registry;

/// Aggregation of converted files into site models
pub mod aggregation;

/// Buffer queue, grouping and the ingestion pipeline
pub mod ingest;

/// Submission boundary
pub mod api;

pub mod error {
    //! Error types and result definitions

    use thiserror::Error;
    use uuid::Uuid;

    /// Result type alias for Swathe operations
    pub type Result<T> = std::result::Result<T, Error>;

    /// Fatal errors. Recoverable decode failures are reported as
    /// [`ReadResult`](crate::parsing::tag_file::ReadResult) values instead.
    #[derive(Error, Debug)]
    pub enum Error {
        /// Configuration error
        #[error("Configuration error: {0}")]
        Config(String),

        /// A discrete event code with no known meaning
        #[error("Unknown discrete event code: {0}")]
        UnknownDiscreteEvent(u64),

        /// An accumulated series was given a time earlier than its latest entry
        #[error("Out of order series insertion: {0}")]
        OutOfOrderSeries(String),

        /// The target site model could not be created or loaded
        #[error("Site model {0} is unavailable: {1}")]
        SiteModelUnavailable(Uuid, String),

        /// Another worker already holds the target site model
        #[error("Site model {0} is already being integrated")]
        TargetBusy(Uuid),

        /// Grids with different cell sizes cannot be merged
        #[error("Cell size mismatch: target {target}, source {source_size}")]
        CellSizeMismatch { target: f64, source_size: f64 },

        /// Malformed request
        #[error("Invalid request: {0}")]
        InvalidRequest(String),

        /// A background task panicked or was cancelled
        #[error("Background task failed: {0}")]
        Task(String),

        /// Invalid regular expression
        #[error("Pattern error: {0}")]
        Pattern(#[from] regex::Error),

        /// Serialization error
        #[error("Serialization error: {0}")]
        Serialization(#[from] bincode::Error),

        /// JSON error
        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),

        /// IO error
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
    }
}

// Re-export commonly used types
pub use error::{Error, Result};
