//! Reads a TAG file for its identity and time range without swathing it.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::SwatheConfig;
use crate::core::geometry::Xyz;
use crate::error::Result;
use crate::execution::epoch_processor::EpochProcessor;
use crate::execution::processor_state::SeedPosition;
use crate::parsing::matchers::TagValueMatcherSink;
use crate::parsing::tag_file::{ReadResult, TagFileReader};

#[derive(Debug, Clone, PartialEq)]
pub struct PreScanResult {
    pub read_result: ReadResult,
    pub hardware_id: String,
    pub machine_type: u8,
    pub device_type: u8,
    pub application_version: String,
    pub design_name: Option<String>,
    pub first_time: Option<DateTime<Utc>>,
    pub last_time: Option<DateTime<Utc>>,
    pub seed_position: Option<SeedPosition>,
    pub last_position: Option<Xyz>,
}

pub fn pre_scan(config: &SwatheConfig, bytes: &[u8]) -> Result<PreScanResult> {
    let mut processor = EpochProcessor::without_swathing(config);
    let read_result = {
        let mut sink = TagValueMatcherSink::new(&mut processor);
        TagFileReader::new(bytes).read(&mut sink)?
    };
    let output = processor.into_output();
    debug!(result = %read_result, hardware_id = %output.state.hardware_id, "Pre-scanned TAG file");

    Ok(PreScanResult {
        read_result,
        seed_position: output.state.seed_position(),
        hardware_id: output.state.hardware_id,
        machine_type: output.state.machine_type,
        device_type: output.state.device_type,
        application_version: output.state.application_version,
        design_name: output.state.design_name,
        first_time: output.first_time,
        last_time: output.last_time,
        last_position: output.last_position,
    })
}
