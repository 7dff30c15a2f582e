//! Converts one TAG file into a self-contained result ready for aggregation.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SwatheConfig;
use crate::core::geometry::BoundingWorldExtent;
use crate::core::types::CoordinateSystemType;
use crate::error::Result;
use crate::execution::epoch_processor::EpochProcessor;
use crate::execution::processor_state::SeedPosition;
use crate::parsing::file_name::TagFileNameParser;
use crate::parsing::matchers::TagValueMatcherSink;
use crate::parsing::tag_file::{ReadResult, TagFileReader};
use crate::storage::design_catalog::DesignCatalog;
use crate::storage::events::{ProductionEventLists, ProofingRun};
use crate::storage::machines::Machine;
use crate::storage::subgrid_tree::ServerSubGridTree;

/// A single file's grid fragment, machine, events and counters
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub file_name: String,
    pub read_result: ReadResult,
    /// Machine described by the file. Its id is resolved during aggregation.
    pub machine: Machine,
    pub grid: ServerSubGridTree,
    pub events: ProductionEventLists,
    pub designs: DesignCatalog,
    pub proofing_runs: Vec<ProofingRun>,
    pub processed_epoch_count: u64,
    pub processed_cell_pass_count: u64,
    pub coverage: BoundingWorldExtent,
    pub seed_position: Option<SeedPosition>,
    pub first_time: Option<DateTime<Utc>>,
    pub last_time: Option<DateTime<Utc>>,
    pub utm_zone: Option<u8>,
    pub coordinate_system: Option<CoordinateSystemType>,
    pub application_version: String,
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        self.read_result.is_success()
    }
}

pub struct TagFileConverter {
    config: SwatheConfig,
    file_names: Option<TagFileNameParser>,
}

impl TagFileConverter {
    pub fn new(config: SwatheConfig) -> Self {
        TagFileConverter {
            config,
            file_names: TagFileNameParser::new().ok(),
        }
    }

    pub fn config(&self) -> &SwatheConfig {
        &self.config
    }

    /// Decode and swath `bytes`. Decode failures are reported in
    /// [`ConversionResult::read_result`]; `Err` is returned only for fatal processing errors.
    pub fn convert(&self, file_name: &str, bytes: &[u8]) -> Result<ConversionResult> {
        info!(file = file_name, bytes = bytes.len(), "Converting TAG file");

        let mut processor = EpochProcessor::new(&self.config);
        let read = {
            let mut sink = TagValueMatcherSink::new(&mut processor);
            TagFileReader::new(bytes).read(&mut sink)
        };
        let read_result = match read {
            Ok(read_result) => read_result,
            Err(e) => {
                warn!(file = file_name, error = %e, "TAG file conversion failed");
                return Err(e);
            }
        };

        let output = processor.into_output();
        let state = &output.state;

        let name = self
            .file_names
            .as_ref()
            .and_then(|parser| parser.parse(file_name))
            .map(|parsed| parsed.machine_name)
            .unwrap_or_else(|| state.hardware_id.clone());
        let mut machine = Machine::new(Uuid::nil(), &name, &state.hardware_id, false);
        machine.machine_type = state.machine_type;
        machine.device_type = state.device_type;
        machine.update_last_known(output.last_time, output.last_position);

        let result = ConversionResult {
            file_name: file_name.to_string(),
            read_result,
            machine,
            seed_position: state.seed_position(),
            utm_zone: state.utm_zone,
            coordinate_system: state.coordinate_system,
            application_version: state.application_version.clone(),
            grid: output.grid,
            events: output.events,
            designs: output.designs,
            proofing_runs: output.proofing_runs,
            processed_epoch_count: output.processed_epoch_count,
            processed_cell_pass_count: output.processed_cell_pass_count,
            coverage: output.coverage,
            first_time: output.first_time,
            last_time: output.last_time,
        };

        info!(
            file = file_name,
            result = %result.read_result,
            epochs = result.processed_epoch_count,
            cell_passes = result.processed_cell_pass_count,
            "Converted TAG file"
        );
        Ok(result)
    }
}
