//! Core data structures and types for the Swathe ingestion engine

pub mod accumulated;
pub mod encoding;
pub mod geometry;
pub mod gps_time;
pub mod types;

pub use accumulated::AccumulatedSeries;
pub use encoding::{NybbleReader, NybbleWriter};
pub use geometry::{BoundingWorldExtent, Triangle, Xyz};
