//! Spatial grid, machines, event lists and site models
//!
//! # Components
//!
//! - **ServerSubGridTree** - Arena of 32 x 32 cell leaf subgrids holding time-ordered cell passes
//! - **MachinesList** - Machines known to a site model, addressed by internal index
//! - **ProductionEventLists** - Per-machine state-change and lifecycle event series
//! - **DesignCatalog** - Design name to id mapping
//! - **SiteModel** - Everything ingested for one project, persisted with bincode

pub mod cell_pass;
pub mod design_catalog;
pub mod events;
pub mod machines;
pub mod site_model;
pub mod subgrid_tree;

// Re-export main types for convenience
pub use cell_pass::{Cell, CellPass};
pub use design_catalog::DesignCatalog;
pub use events::{EventList, ProductionEventLists, ProofingRun};
pub use machines::{Machine, MachinesList};
pub use site_model::SiteModel;
pub use subgrid_tree::{CellAddress, ServerSubGridTree};
