//! Mutable per-file state driven by the value matchers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::accumulated::AccumulatedSeries;
use crate::core::geometry::Xyz;
use crate::core::gps_time::gps_to_utc;
use crate::core::types::{
    CoordinateSystemType, ElevationMappingMode, GpsAccuracy, GpsMode, MachineGear, OnGroundState,
    PositioningTech, VibrationState,
};
use crate::error::Result;
use crate::storage::cell_pass::CellPass;

/// Millimetres per metre; position offsets are transmitted in millimetres
const OFFSET_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSide {
    BladeLeft,
    BladeRight,
    TrackLeft,
    TrackRight,
    WheelLeft,
    WheelRight,
    RearLeft,
    RearRight,
}

impl PositionSide {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordinate {
    Easting,
    Northing,
    Elevation,
}

/// A working edge described by a left and right position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Wheel,
    Track,
    Blade,
}

impl Edge {
    /// Order in which edges are tried when swathing
    pub const PREFERENCE: [Edge; 3] = [Edge::Wheel, Edge::Track, Edge::Blade];

    pub fn sides(self) -> (PositionSide, PositionSide) {
        match self {
            Edge::Wheel => (PositionSide::WheelLeft, PositionSide::WheelRight),
            Edge::Track => (PositionSide::TrackLeft, PositionSide::TrackRight),
            Edge::Blade => (PositionSide::BladeLeft, PositionSide::BladeRight),
        }
    }
}

/// Ordinates of one side. `None` means no absolute value has been seen since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SidePosition {
    pub easting: Option<f64>,
    pub northing: Option<f64>,
    pub elevation: Option<f64>,
}

impl SidePosition {
    fn slot(&mut self, ordinate: Ordinate) -> &mut Option<f64> {
        match ordinate {
            Ordinate::Easting => &mut self.easting,
            Ordinate::Northing => &mut self.northing,
            Ordinate::Elevation => &mut self.elevation,
        }
    }

    pub fn get(&self, ordinate: Ordinate) -> Option<f64> {
        match ordinate {
            Ordinate::Easting => self.easting,
            Ordinate::Northing => self.northing,
            Ordinate::Elevation => self.elevation,
        }
    }

    pub fn set_absolute(&mut self, ordinate: Ordinate, value: f64) {
        *self.slot(ordinate) = Some(value);
    }

    /// Apply a millimetre offset. Fails if no absolute baseline exists.
    pub fn apply_offset(&mut self, ordinate: Ordinate, offset_mm: i64) -> bool {
        match self.slot(ordinate) {
            Some(value) => {
                *value += offset_mm as f64 / OFFSET_SCALE;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, ordinate: Ordinate) {
        *self.slot(ordinate) = None;
    }

    pub fn to_xyz(&self) -> Option<Xyz> {
        Some(Xyz::new(self.easting?, self.northing?, self.elevation?))
    }
}

/// A 16-bit attribute that accepts absolute values and signed offsets from them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackedValue {
    value: Option<u16>,
}

impl TrackedValue {
    pub fn get(&self) -> Option<u16> {
        self.value
    }

    pub fn has_absolute(&self) -> bool {
        self.value.is_some()
    }

    pub fn set_absolute(&mut self, value: u64) -> bool {
        match u16::try_from(value) {
            Ok(value) => {
                self.value = Some(value);
                true
            }
            Err(_) => false,
        }
    }

    /// Rejected without a baseline, or if the result leaves the 16-bit range
    pub fn apply_offset(&mut self, offset: i64) -> bool {
        let Some(current) = self.value else { return false };
        match u16::try_from(i64::from(current) + offset) {
            Ok(value) => {
                self.value = Some(value);
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}

/// Geodetic position reported by the machine, used to seed coordinate system resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedPosition {
    /// Radians
    pub latitude: f64,
    /// Radians
    pub longitude: f64,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessorState {
    pub selected_side: Option<PositionSide>,
    positions: [SidePosition; 8],

    pub gps_week: Option<u32>,
    pub gps_milliseconds: Option<u64>,

    pub ccv: TrackedValue,
    pub mdp: TrackedValue,
    pub rmv: TrackedValue,
    pub frequency: TrackedValue,
    pub amplitude: TrackedValue,
    pub temperature: TrackedValue,
    pub cca: Option<u8>,
    /// Left front, right front, left rear, right rear
    pub cca_corners: [Option<u8>; 4],

    pub gear: Option<MachineGear>,
    pub on_ground: Option<OnGroundState>,
    pub gps_mode: Option<GpsMode>,
    pub gps_accuracy: Option<(GpsAccuracy, u16)>,
    pub vibration_state: Option<VibrationState>,
    pub elevation_mapping_mode: Option<ElevationMappingMode>,
    pub positioning_tech: Option<PositioningTech>,
    pub coordinate_system: Option<CoordinateSystemType>,
    pub utm_zone: Option<u8>,

    pub target_ccv: Option<u16>,
    pub target_mdp: Option<u16>,
    pub target_cca: Option<u8>,
    pub target_pass_count: Option<u16>,
    pub temperature_warning_min: Option<u16>,
    pub temperature_warning_max: Option<u16>,
    pub design_name: Option<String>,

    pub hardware_id: String,
    pub machine_type: u8,
    pub device_type: u8,
    pub application_version: String,

    pub seed_latitude: Option<f64>,
    pub seed_longitude: Option<f64>,
    pub seed_height: Option<f64>,

    /// Proofing run start carried by its own week/time pair
    pub proofing_start_week: Option<u32>,
    pub proofing_start_milliseconds: Option<u64>,
}

impl ProcessorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// UTC time of the current sample, once both week and millisecond are known
    pub fn data_time(&self) -> Option<DateTime<Utc>> {
        gps_to_utc(self.gps_week?, self.gps_milliseconds?)
    }

    pub fn proofing_start_time(&self) -> Option<DateTime<Utc>> {
        let week = self.proofing_start_week.or(self.gps_week)?;
        gps_to_utc(week, self.proofing_start_milliseconds?)
    }

    pub fn position(&self, side: PositionSide) -> &SidePosition {
        &self.positions[side.index()]
    }

    pub fn position_mut(&mut self, side: PositionSide) -> &mut SidePosition {
        &mut self.positions[side.index()]
    }

    pub fn selected_position_mut(&mut self) -> Option<&mut SidePosition> {
        let side = self.selected_side?;
        Some(self.position_mut(side))
    }

    /// Left and right positions of an edge, if both are complete
    pub fn edge(&self, edge: Edge) -> Option<(Xyz, Xyz)> {
        let (left, right) = edge.sides();
        Some((self.position(left).to_xyz()?, self.position(right).to_xyz()?))
    }

    pub fn has_valid_position(&self) -> bool {
        Edge::PREFERENCE.iter().any(|edge| self.edge(*edge).is_some())
    }

    /// Explicit CCA if one was given, otherwise the lowest corner value
    pub fn effective_cca(&self) -> Option<u8> {
        self.cca.or_else(|| self.cca_corners.iter().flatten().min().copied())
    }

    pub fn seed_position(&self) -> Option<SeedPosition> {
        Some(SeedPosition {
            latitude: self.seed_latitude?,
            longitude: self.seed_longitude?,
            height: self.seed_height,
        })
    }

    pub fn temperature_warning_levels(&self) -> Option<(u16, u16)> {
        Some((self.temperature_warning_min?, self.temperature_warning_max?))
    }
}

/// Per-attribute series sampled by the swather at interpolated cell times
#[derive(Debug, Clone, Default)]
pub struct AttributeSeries {
    pub ccv: AccumulatedSeries<Option<u16>>,
    pub mdp: AccumulatedSeries<Option<u16>>,
    pub rmv: AccumulatedSeries<Option<u16>>,
    pub frequency: AccumulatedSeries<Option<u16>>,
    pub amplitude: AccumulatedSeries<Option<u16>>,
    pub temperature: AccumulatedSeries<Option<u16>>,
    pub cca: AccumulatedSeries<Option<u8>>,
    pub gps_mode: AccumulatedSeries<Option<GpsMode>>,
    pub gear: AccumulatedSeries<Option<MachineGear>>,
    pub on_ground: AccumulatedSeries<Option<OnGroundState>>,
}

fn record_change<T: Clone + PartialEq>(
    series: &mut AccumulatedSeries<T>,
    time: DateTime<Utc>,
    value: T,
) -> Result<()> {
    if series.latest() != Some(&value) {
        series.add(time, value)?;
    }
    Ok(())
}

impl AttributeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the state's current attribute values wherever they differ from the latest entry
    pub fn record(&mut self, time: DateTime<Utc>, state: &ProcessorState) -> Result<()> {
        record_change(&mut self.ccv, time, state.ccv.get())?;
        record_change(&mut self.mdp, time, state.mdp.get())?;
        record_change(&mut self.rmv, time, state.rmv.get())?;
        record_change(&mut self.frequency, time, state.frequency.get())?;
        record_change(&mut self.amplitude, time, state.amplitude.get())?;
        record_change(&mut self.temperature, time, state.temperature.get())?;
        record_change(&mut self.cca, time, state.effective_cca())?;
        record_change(&mut self.gps_mode, time, state.gps_mode)?;
        record_change(&mut self.gear, time, state.gear)?;
        record_change(&mut self.on_ground, time, state.on_ground)?;
        Ok(())
    }

    /// Build a cell pass from the values in force at `time`
    pub fn cell_pass_at(
        &self,
        time: DateTime<Utc>,
        height: f32,
        machine_index: u16,
        machine_speed: f64,
    ) -> CellPass {
        CellPass {
            time,
            height,
            machine_index,
            ccv: self.ccv.value_at(time).copied().flatten(),
            mdp: self.mdp.value_at(time).copied().flatten(),
            rmv: self.rmv.value_at(time).copied().flatten(),
            frequency: self.frequency.value_at(time).copied().flatten(),
            amplitude: self.amplitude.value_at(time).copied().flatten(),
            temperature: self.temperature.value_at(time).copied().flatten(),
            cca: self.cca.value_at(time).copied().flatten(),
            gps_mode: self.gps_mode.value_at(time).copied().flatten(),
            gear: self.gear.value_at(time).copied().flatten(),
            on_ground: self.on_ground.value_at(time).copied().flatten(),
            machine_speed,
        }
    }

    pub fn discard_all_but_latest(&mut self) {
        self.ccv.discard_all_but_latest();
        self.mdp.discard_all_but_latest();
        self.rmv.discard_all_but_latest();
        self.frequency.discard_all_but_latest();
        self.amplitude.discard_all_but_latest();
        self.temperature.discard_all_but_latest();
        self.cca.discard_all_but_latest();
        self.gps_mode.discard_all_but_latest();
        self.gear.discard_all_but_latest();
        self.on_ground.discard_all_but_latest();
    }
}
