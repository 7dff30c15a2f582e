use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::geometry::BoundingWorldExtent;
use crate::error::Result;
use crate::storage::design_catalog::DesignCatalog;
use crate::storage::events::{ProductionEventLists, ProofingRun};
use crate::storage::machines::MachinesList;
use crate::storage::subgrid_tree::ServerSubGridTree;

const SITE_MODEL_FILE_EXTENSION: &str = "sitemodel";

/// Persistent record of everything ingested for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteModel {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub grid: ServerSubGridTree,
    pub machines: MachinesList,
    /// Event lists keyed by machine internal index
    pub machine_events: BTreeMap<u16, ProductionEventLists>,
    pub designs: DesignCatalog,
    pub proofing_runs: Vec<ProofingRun>,
    pub extent: BoundingWorldExtent,
    pub total_processed_cell_passes: u64,
    pub total_processed_epochs: u64,
    pub processed_tag_file_count: u64,
}

impl SiteModel {
    pub fn new(id: Uuid, cell_size: f64) -> Self {
        let now = Utc::now();
        SiteModel {
            id,
            created: now,
            last_modified: now,
            grid: ServerSubGridTree::new(cell_size),
            machines: MachinesList::new(),
            machine_events: BTreeMap::new(),
            designs: DesignCatalog::new(),
            proofing_runs: Vec::new(),
            extent: BoundingWorldExtent::inverted(),
            total_processed_cell_passes: 0,
            total_processed_epochs: 0,
            processed_tag_file_count: 0,
        }
    }

    pub fn event_lists(&self, machine_index: u16) -> Option<&ProductionEventLists> {
        self.machine_events.get(&machine_index)
    }

    pub fn event_lists_mut(&mut self, machine_index: u16) -> &mut ProductionEventLists {
        self.machine_events.entry(machine_index).or_default()
    }

    /// Add a proofing run unless one with the same machine, name and start is already present
    pub fn add_proofing_run(&mut self, run: ProofingRun) -> bool {
        let exists = self.proofing_runs.iter().any(|existing| {
            existing.machine_index == run.machine_index
                && existing.name == run.name
                && existing.start == run.start
        });
        if !exists {
            self.proofing_runs.push(run);
        }
        !exists
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty() && self.machines.is_empty()
    }

    /// File name used when the model is stored in a directory
    pub fn storage_path(directory: &Path, id: Uuid) -> PathBuf {
        directory.join(format!("{}.{}", id, SITE_MODEL_FILE_EXTENSION))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        let mut file = File::create(path)?;
        file.write_all(&encoded)?;
        debug!(
            site_model = %self.id,
            bytes = encoded.len(),
            path = %path.display(),
            "Saved site model"
        );
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        let model: SiteModel = bincode::deserialize(&buffer)?;
        Ok(model)
    }
}
