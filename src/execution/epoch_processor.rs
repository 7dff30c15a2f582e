//! Epoch state machine.
//!
//! Values arriving after a `TIME` record describe the sample at that time. When the next `TIME`
//! arrives (or the stream ends) the sample is closed: its state is recorded into the event lists
//! and attribute series, and if a previous sample exists the epoch between them is swathed.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::config::SwatheConfig;
use crate::core::geometry::{BoundingWorldExtent, Xyz};
use crate::core::gps_time::gps_to_utc;
use crate::core::types::{
    DiscreteEventKind, GpsMode, MachineStartupShutdown, OnGroundState, PositioningTech,
    RecordedData,
};
use crate::error::{Error, Result};
use crate::execution::processor_state::{AttributeSeries, Edge, ProcessorState};
use crate::execution::swather::{SwathEpoch, Swather};
use crate::parsing::tag_file::ReadResult;
use crate::storage::design_catalog::DesignCatalog;
use crate::storage::events::{ProductionEventLists, ProofingRun};
use crate::storage::subgrid_tree::ServerSubGridTree;

/// Machine index used for passes and proofing runs inside a single file's results
pub const FILE_MACHINE_INDEX: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorPhase {
    AwaitingFirstEpoch,
    HaveValidEpoch,
    Swathing,
    DiscreteEvent,
    Finalizing,
}

/// Time and edge positions of one closed sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSnapshot {
    pub time: DateTime<Utc>,
    pub wheel: Option<(Xyz, Xyz)>,
    pub track: Option<(Xyz, Xyz)>,
    pub blade: Option<(Xyz, Xyz)>,
    pub on_ground: Option<OnGroundState>,
}

impl EpochSnapshot {
    pub fn capture(time: DateTime<Utc>, state: &ProcessorState) -> Self {
        EpochSnapshot {
            time,
            wheel: state.edge(Edge::Wheel),
            track: state.edge(Edge::Track),
            blade: state.edge(Edge::Blade),
            on_ground: state.on_ground,
        }
    }

    pub fn edge(&self, edge: Edge) -> Option<(Xyz, Xyz)> {
        match edge {
            Edge::Wheel => self.wheel,
            Edge::Track => self.track,
            Edge::Blade => self.blade,
        }
    }

    /// Midpoint of the preferred complete edge
    pub fn position(&self) -> Option<Xyz> {
        Edge::PREFERENCE
            .iter()
            .find_map(|edge| self.edge(*edge))
            .map(|(left, right)| left.midpoint(&right))
    }
}

/// Everything a processor produced for one file
#[derive(Debug, Clone)]
pub struct ProcessorOutput {
    pub state: ProcessorState,
    pub grid: ServerSubGridTree,
    pub events: ProductionEventLists,
    pub designs: DesignCatalog,
    pub proofing_runs: Vec<ProofingRun>,
    pub processed_epoch_count: u64,
    pub processed_cell_pass_count: u64,
    pub coverage: BoundingWorldExtent,
    pub first_time: Option<DateTime<Utc>>,
    pub last_time: Option<DateTime<Utc>>,
    pub last_position: Option<Xyz>,
}

pub struct EpochProcessor {
    pub state: ProcessorState,
    phase: ProcessorPhase,
    swather: Swather,
    swathing_enabled: bool,
    reject_invalid_positions: bool,
    previous: Option<EpochSnapshot>,
    attributes: AttributeSeries,
    grid: ServerSubGridTree,
    events: ProductionEventLists,
    designs: DesignCatalog,
    proofing_runs: Vec<ProofingRun>,
    open_proofing_run: Option<(String, DateTime<Utc>)>,
    deferred_events: Vec<(DiscreteEventKind, Option<String>)>,
    /// Week received while a sample was open; applied with the next time value
    pending_week: Option<u32>,
    recording: bool,
    high_water_time: Option<DateTime<Utc>>,
    first_time: Option<DateTime<Utc>>,
    last_position: Option<Xyz>,
    processed_epoch_count: u64,
    processed_cell_pass_count: u64,
    coverage: BoundingWorldExtent,
    rejection: Option<ReadResult>,
}

impl EpochProcessor {
    pub fn new(config: &SwatheConfig) -> Self {
        EpochProcessor {
            state: ProcessorState::new(),
            phase: ProcessorPhase::AwaitingFirstEpoch,
            swather: Swather::new(config.max_swath_extent, FILE_MACHINE_INDEX),
            swathing_enabled: true,
            reject_invalid_positions: config.reject_invalid_positions,
            previous: None,
            attributes: AttributeSeries::new(),
            grid: ServerSubGridTree::new(config.cell_size),
            events: ProductionEventLists::new(),
            designs: DesignCatalog::new(),
            proofing_runs: Vec::new(),
            open_proofing_run: None,
            deferred_events: Vec::new(),
            pending_week: None,
            recording: false,
            high_water_time: None,
            first_time: None,
            last_position: None,
            processed_epoch_count: 0,
            processed_cell_pass_count: 0,
            coverage: BoundingWorldExtent::inverted(),
            rejection: None,
        }
    }

    /// A processor that tracks state and events but never swathes
    pub fn without_swathing(config: &SwatheConfig) -> Self {
        let mut processor = Self::new(config);
        processor.swathing_enabled = false;
        processor
    }

    pub fn phase(&self) -> ProcessorPhase {
        self.phase
    }

    pub fn rejection(&self) -> Option<ReadResult> {
        self.rejection
    }

    pub fn processed_epoch_count(&self) -> u64 {
        self.processed_epoch_count
    }

    pub fn processed_cell_pass_count(&self) -> u64 {
        self.processed_cell_pass_count
    }

    pub fn events(&self) -> &ProductionEventLists {
        &self.events
    }

    pub fn grid(&self) -> &ServerSubGridTree {
        &self.grid
    }

    pub fn proofing_runs(&self) -> &[ProofingRun] {
        &self.proofing_runs
    }

    /// Time used to stamp recorded values; never moves backwards
    fn stamp_time(&self) -> Option<DateTime<Utc>> {
        let time = self.state.data_time()?;
        Some(self.high_water_time.map_or(time, |high| time.max(high)))
    }

    pub fn process_time_absolute(&mut self, milliseconds: u64) -> Result<bool> {
        let week = self.pending_week.or(self.state.gps_week);
        if week.is_some_and(|week| gps_to_utc(week, milliseconds).is_none()) {
            debug!(milliseconds, "Time does not resolve to a UTC date");
            return Ok(false);
        }
        self.close_epoch()?;
        if self.rejection.is_some() {
            return Ok(false);
        }
        if let Some(week) = self.pending_week.take() {
            self.state.gps_week = Some(week);
        }
        self.state.gps_milliseconds = Some(milliseconds);
        self.time_updated()?;
        Ok(true)
    }

    /// Advance the time by `tenths` of a second. Needs an absolute time first.
    pub fn process_time_offset(&mut self, tenths: u64) -> Result<bool> {
        let Some(current) = self.state.gps_milliseconds else { return Ok(false) };
        match tenths.checked_mul(100).and_then(|offset| current.checked_add(offset)) {
            Some(milliseconds) => self.process_time_absolute(milliseconds),
            None => Ok(false),
        }
    }

    pub fn process_week(&mut self, week: u32) -> Result<bool> {
        if gps_to_utc(week, self.state.gps_milliseconds.unwrap_or(0)).is_none() {
            debug!(week, "Week does not resolve to a UTC date");
            return Ok(false);
        }
        if self.state.gps_week.is_some() && self.state.gps_milliseconds.is_some() {
            self.pending_week = Some(week);
        } else {
            self.state.gps_week = Some(week);
            self.time_updated()?;
        }
        Ok(true)
    }

    fn time_updated(&mut self) -> Result<()> {
        let Some(time) = self.stamp_time() else { return Ok(()) };
        self.high_water_time = Some(time);
        if self.first_time.is_none() {
            self.first_time = Some(time);
        }
        if !self.recording {
            self.recording = true;
            self.events.start_end_recorded_data.push_occurrence(time, RecordedData::Start)?;
        }
        for (kind, name) in std::mem::take(&mut self.deferred_events) {
            self.process_discrete_event(kind, name)?;
        }
        Ok(())
    }

    /// Close the open sample: record its state and swath from the previous one
    fn close_epoch(&mut self) -> Result<()> {
        let Some(time) = self.stamp_time() else { return Ok(()) };
        self.record_state(time)?;

        let current = EpochSnapshot::capture(time, &self.state);
        if let Some(position) = current.position() {
            self.last_position = Some(position);
        }
        if let Some(previous) = self.previous.take() {
            self.swath_epoch(&previous, &current);
        }
        if self.rejection.is_none() {
            self.previous = Some(current);
            self.phase = ProcessorPhase::HaveValidEpoch;
        }
        self.attributes.discard_all_but_latest();
        Ok(())
    }

    fn swath_epoch(&mut self, previous: &EpochSnapshot, current: &EpochSnapshot) {
        if !self.swathing_enabled {
            return;
        }
        if current.on_ground == Some(OnGroundState::No) {
            trace!(time = %current.time, "Machine off ground, epoch not swathed");
            return;
        }
        if current.time <= previous.time {
            return;
        }

        let edges = Edge::PREFERENCE
            .iter()
            .find_map(|edge| Some((previous.edge(*edge)?, current.edge(*edge)?)));
        let Some(((left_start, right_start), (left_end, right_end))) = edges else {
            if self.reject_invalid_positions {
                debug!(time = %current.time, "Epoch has no valid edge positions");
                self.rejection = Some(ReadResult::InvalidPosition);
            }
            return;
        };

        self.phase = ProcessorPhase::Swathing;
        let epoch = SwathEpoch {
            start_time: previous.time,
            end_time: current.time,
            left_start,
            right_start,
            left_end,
            right_end,
        };
        let outcome = self.swather.swath(&epoch, &self.attributes, &mut self.grid);
        if outcome.epochs > 0 {
            self.coverage.include_extent(&epoch.extent());
        }
        self.processed_epoch_count += outcome.epochs;
        self.processed_cell_pass_count += outcome.cell_passes;
        self.phase = ProcessorPhase::HaveValidEpoch;
    }

    fn record_state(&mut self, time: DateTime<Utc>) -> Result<()> {
        let events = &mut self.events;
        let state = &self.state;

        if let Some(mode) = state.gps_mode {
            events.gps_mode.put(time, mode)?;
        }
        if let Some(accuracy) = state.gps_accuracy {
            events.gps_accuracy.put(time, accuracy)?;
        }
        if let Some(tech) = state.positioning_tech {
            events.positioning_tech.put(time, tech)?;
        }
        if let Some(on_ground) = state.on_ground {
            events.on_ground.put(time, on_ground)?;
        }
        if let Some(mode) = state.elevation_mapping_mode {
            events.elevation_mapping_mode.put(time, mode)?;
        }
        if let Some(gear) = state.gear {
            events.machine_gear.put(time, gear)?;
        }
        if let Some(vibration) = state.vibration_state {
            events.vibration_state.put(time, vibration)?;
        }
        if let Some(target) = state.target_ccv {
            events.target_ccv.put(time, target)?;
        }
        if let Some(target) = state.target_mdp {
            events.target_mdp.put(time, target)?;
        }
        if let Some(target) = state.target_cca {
            events.target_cca.put(time, target)?;
        }
        if let Some(target) = state.target_pass_count {
            events.target_pass_count.put(time, target)?;
        }
        if let Some(levels) = state.temperature_warning_levels() {
            events.temperature_warning_levels.put(time, levels)?;
        }
        if let Some(design) = state.design_name.as_deref() {
            let id = self.designs.encode(design);
            events.design_name_id.put(time, id)?;
        }

        if self.swathing_enabled {
            self.attributes.record(time, state)?;
        }
        Ok(())
    }

    /// Decode an `EVNT` code. Codes with no meaning are fatal.
    pub fn process_discrete_event_code(&mut self, code: u64) -> Result<bool> {
        let kind = DiscreteEventKind::from_code(code).ok_or(Error::UnknownDiscreteEvent(code))?;
        self.process_discrete_event(kind, None)
    }

    /// Apply a lifecycle marker. Markers arriving before any data time are held until one exists.
    pub fn process_discrete_event(
        &mut self,
        kind: DiscreteEventKind,
        name: Option<String>,
    ) -> Result<bool> {
        let Some(time) = self.stamp_time() else {
            self.deferred_events.push((kind, name));
            return Ok(true);
        };

        let resume_phase = self.phase;
        self.phase = ProcessorPhase::DiscreteEvent;
        trace!(event = ?kind, time = %time, "Discrete event");

        match kind {
            DiscreteEventKind::MachineStartup => {
                self.events
                    .machine_startup_shutdown
                    .push_occurrence(time, MachineStartupShutdown::Startup)?;
            }
            DiscreteEventKind::MachineShutdown => {
                self.events
                    .machine_startup_shutdown
                    .push_occurrence(time, MachineStartupShutdown::Shutdown)?;
                self.end_recording(time)?;
            }
            DiscreteEventKind::MapReset => {
                let design =
                    self.state.design_name.as_deref().map(|name| self.designs.encode(name));
                self.events.map_resets.push_occurrence(time, design)?;
            }
            DiscreteEventKind::UtsMode => {
                self.state.positioning_tech = Some(PositioningTech::Uts);
                self.events.positioning_tech.put(time, PositioningTech::Uts)?;
            }
            DiscreteEventKind::StartProofing => {
                self.close_proofing_run(time);
                let start = self.state.proofing_start_time().unwrap_or(time);
                self.open_proofing_run = Some((name.unwrap_or_default(), start));
            }
            DiscreteEventKind::EndProofing => self.close_proofing_run(time),
        }

        self.phase = resume_phase;
        Ok(true)
    }

    fn close_proofing_run(&mut self, end: DateTime<Utc>) {
        if let Some((name, start)) = self.open_proofing_run.take() {
            self.proofing_runs.push(ProofingRun {
                machine_index: FILE_MACHINE_INDEX,
                name,
                start,
                end,
            });
            self.state.proofing_start_week = None;
            self.state.proofing_start_milliseconds = None;
        }
    }

    /// Fallback GPS mode and positioning technology, then the end-of-recording marker
    fn end_recording(&mut self, time: DateTime<Utc>) -> Result<()> {
        if !self.recording {
            return Ok(());
        }
        self.record_state(time)?;
        if self.events.gps_mode.is_empty() {
            self.events.gps_mode.put(time, GpsMode::NoGps)?;
        }
        if self.events.positioning_tech.is_empty() {
            self.events.positioning_tech.put(time, PositioningTech::Uts)?;
        }
        self.events.start_end_recorded_data.push_occurrence(time, RecordedData::End)?;
        self.recording = false;
        Ok(())
    }

    /// Close the final epoch and finalize the recording
    pub fn finish(&mut self) -> Result<bool> {
        self.close_epoch()?;
        if self.rejection.is_some() {
            return Ok(false);
        }
        self.phase = ProcessorPhase::Finalizing;
        if let Some(time) = self.stamp_time() {
            self.close_proofing_run(time);
            self.end_recording(time)?;
        }
        Ok(true)
    }

    pub fn into_output(self) -> ProcessorOutput {
        ProcessorOutput {
            state: self.state,
            grid: self.grid,
            events: self.events,
            designs: self.designs,
            proofing_runs: self.proofing_runs,
            processed_epoch_count: self.processed_epoch_count,
            processed_cell_pass_count: self.processed_cell_pass_count,
            coverage: self.coverage,
            first_time: self.first_time,
            last_time: self.high_water_time,
            last_position: self.last_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::processor_state::{Ordinate, PositionSide};

    fn set_side(processor: &mut EpochProcessor, side: PositionSide, x: f64, y: f64, z: f64) {
        let position = processor.state.position_mut(side);
        position.set_absolute(Ordinate::Easting, x);
        position.set_absolute(Ordinate::Northing, y);
        position.set_absolute(Ordinate::Elevation, z);
    }

    fn config() -> SwatheConfig {
        SwatheConfig {
            cell_size: 1.0,
            ..SwatheConfig::default()
        }
    }

    #[test]
    fn test_two_samples_make_one_epoch() {
        let mut processor = EpochProcessor::new(&config());
        processor.process_week(2200).unwrap();
        processor.process_time_absolute(1_000).unwrap();
        set_side(&mut processor, PositionSide::BladeLeft, 0.0, 0.0, 5.0);
        set_side(&mut processor, PositionSide::BladeRight, 3.0, 0.0, 5.0);
        assert_eq!(processor.phase(), ProcessorPhase::AwaitingFirstEpoch);

        processor.process_time_absolute(2_000).unwrap();
        assert_eq!(processor.phase(), ProcessorPhase::HaveValidEpoch);
        set_side(&mut processor, PositionSide::BladeLeft, 0.0, 4.0, 5.0);
        set_side(&mut processor, PositionSide::BladeRight, 3.0, 4.0, 5.0);

        assert!(processor.finish().unwrap());
        assert_eq!(processor.phase(), ProcessorPhase::Finalizing);
        assert_eq!(processor.processed_epoch_count(), 1);
        assert_eq!(processor.processed_cell_pass_count(), 12);
    }

    #[test]
    fn test_off_ground_epoch_is_skipped() {
        let mut processor = EpochProcessor::new(&config());
        processor.process_week(2200).unwrap();
        processor.process_time_absolute(1_000).unwrap();
        set_side(&mut processor, PositionSide::WheelLeft, 0.0, 0.0, 5.0);
        set_side(&mut processor, PositionSide::WheelRight, 3.0, 0.0, 5.0);
        processor.process_time_absolute(2_000).unwrap();
        set_side(&mut processor, PositionSide::WheelLeft, 0.0, 4.0, 5.0);
        set_side(&mut processor, PositionSide::WheelRight, 3.0, 4.0, 5.0);
        processor.state.on_ground = Some(OnGroundState::No);
        processor.finish().unwrap();

        assert_eq!(processor.processed_epoch_count(), 0);
        assert!(processor.grid().is_empty());
    }

    #[test]
    fn test_invalid_positions_rejected_when_configured() {
        let config = SwatheConfig {
            reject_invalid_positions: true,
            ..config()
        };
        let mut processor = EpochProcessor::new(&config);
        processor.process_week(2200).unwrap();
        processor.process_time_absolute(1_000).unwrap();
        processor.process_time_absolute(2_000).unwrap();
        assert!(!processor.process_time_absolute(3_000).unwrap());
        assert_eq!(processor.rejection(), Some(ReadResult::InvalidPosition));
    }

    #[test]
    fn test_invalid_positions_skipped_by_default() {
        let mut processor = EpochProcessor::new(&config());
        processor.process_week(2200).unwrap();
        processor.process_time_absolute(1_000).unwrap();
        assert!(processor.process_time_absolute(2_000).unwrap());
        assert!(processor.finish().unwrap());
        assert_eq!(processor.processed_epoch_count(), 0);
    }

    #[test]
    fn test_unknown_event_code_is_fatal() {
        let mut processor = EpochProcessor::new(&config());
        let err = processor.process_discrete_event_code(99).unwrap_err();
        assert!(matches!(err, Error::UnknownDiscreteEvent(99)));
    }

    #[test]
    fn test_unresolvable_week_and_time_are_rejected() {
        let mut processor = EpochProcessor::new(&config());
        assert!(!processor.process_week(50_000_000).unwrap());
        assert_eq!(processor.state.gps_week, None);

        processor.process_week(2200).unwrap();
        assert!(!processor.process_time_absolute(u64::MAX).unwrap());
        assert!(processor.process_time_absolute(1_000).unwrap());
        assert!(!processor.process_time_offset(u64::MAX).unwrap());
        assert_eq!(processor.state.gps_milliseconds, Some(1_000));
    }

    #[test]
    fn test_events_before_time_are_deferred() {
        let mut processor = EpochProcessor::new(&config());
        processor.process_discrete_event(DiscreteEventKind::MachineStartup, None).unwrap();
        assert!(processor.events().machine_startup_shutdown.is_empty());

        processor.process_week(2200).unwrap();
        processor.process_time_absolute(500).unwrap();
        assert_eq!(processor.events().machine_startup_shutdown.len(), 1);
        assert_eq!(processor.events().start_end_recorded_data.latest(), Some(&RecordedData::Start));
    }

    #[test]
    fn test_finish_synthesizes_fallback_events() {
        let mut processor = EpochProcessor::new(&config());
        processor.process_week(2200).unwrap();
        processor.process_time_absolute(500).unwrap();
        processor.finish().unwrap();

        let events = processor.events();
        assert_eq!(events.gps_mode.latest(), Some(&GpsMode::NoGps));
        assert_eq!(events.positioning_tech.latest(), Some(&PositioningTech::Uts));
        let markers: Vec<RecordedData> =
            events.start_end_recorded_data.iter().map(|(_, m)| *m).collect();
        assert_eq!(markers, vec![RecordedData::Start, RecordedData::End]);
    }

    #[test]
    fn test_observed_gps_mode_suppresses_fallback() {
        let mut processor = EpochProcessor::new(&config());
        processor.process_week(2200).unwrap();
        processor.process_time_absolute(500).unwrap();
        processor.state.gps_mode = Some(GpsMode::Fixed);
        processor.process_discrete_event(DiscreteEventKind::MachineShutdown, None).unwrap();

        let events = processor.events();
        assert_eq!(events.gps_mode.len(), 1);
        assert_eq!(events.gps_mode.latest(), Some(&GpsMode::Fixed));
        assert_eq!(
            events.machine_startup_shutdown.latest(),
            Some(&MachineStartupShutdown::Shutdown)
        );
    }

    #[test]
    fn test_proofing_run_spans_start_to_end() {
        let mut processor = EpochProcessor::new(&config());
        processor.process_week(2200).unwrap();
        processor.process_time_absolute(1_000).unwrap();
        processor
            .process_discrete_event(DiscreteEventKind::StartProofing, Some("Strip A".to_string()))
            .unwrap();
        processor.process_time_absolute(9_000).unwrap();
        processor.process_discrete_event(DiscreteEventKind::EndProofing, None).unwrap();

        let runs = processor.proofing_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "Strip A");
        assert_eq!((runs[0].end - runs[0].start).num_milliseconds(), 8_000);
    }
}
