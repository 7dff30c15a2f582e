//! Per-file processing
//!
//! Turns the values of one TAG file into a grid fragment and event lists.
//!
//! # Components
//!
//! - **EpochProcessor** - Epoch state machine driven by the value matchers
//! - **Swather** - Rasterizes the area swept between two epochs
//! - **TagFileConverter** - Runs a whole file and packages the result for aggregation
//! - **pre_scan** - Reads identity and time range without swathing
//!
//! # Example
//!
//! ```ignore
//! use swathe::execution::TagFileConverter;
//!
//! let converter = TagFileConverter::new(config);
//! let result = converter.convert("0523J019SW--CB54--190814094812.tag", &bytes)?;
//! println!(
//!     "{} epochs, {} passes",
//!     result.processed_epoch_count, result.processed_cell_pass_count
//! );
//! ```

pub mod converter;
pub mod epoch_processor;
pub mod pre_scan;
pub mod processor_state;
pub mod swather;

// Re-export main types for convenience
pub use converter::{ConversionResult, TagFileConverter};
pub use epoch_processor::EpochProcessor;
pub use swather::Swather;
