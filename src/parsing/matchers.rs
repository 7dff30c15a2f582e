//! Tag name → value handler table.
//!
//! Each [`ValueMatcher`] holds an optional handler per value kind. The table is built once and
//! shared. [`TagValueMatcherSink`] binds dictionary ids to matchers when a read starts, then
//! forwards every value to the bound handler. Tags with no matcher are accepted and ignored; a
//! value of a kind the matcher has no handler for is rejected.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::core::types::{
    split_gps_accuracy_word, CoordinateSystemType, DiscreteEventKind, ElevationMappingMode, GpsMode,
    MachineGear, OnGroundState, PositioningTech, VibrationState,
};
use crate::error::Result;
use crate::execution::epoch_processor::EpochProcessor;
use crate::execution::processor_state::{Ordinate, PositionSide};
use crate::parsing::dictionary::{DictionaryItem, FieldType, TagDictionary};
use crate::parsing::tag_file::{ReadResult, TagValueSink};
use crate::parsing::value_names as names;

pub type IntegerHandler = fn(&mut EpochProcessor, i64) -> Result<bool>;
pub type UnsignedHandler = fn(&mut EpochProcessor, &DictionaryItem, u64) -> Result<bool>;
pub type DoubleHandler = fn(&mut EpochProcessor, f64) -> Result<bool>;
pub type StringHandler = fn(&mut EpochProcessor, &str) -> Result<bool>;
pub type EmptyHandler = fn(&mut EpochProcessor) -> Result<bool>;

/// Handlers for one tag, one slot per value kind
#[derive(Clone, Copy, Default)]
pub struct ValueMatcher {
    pub integer: Option<IntegerHandler>,
    pub unsigned: Option<UnsignedHandler>,
    pub double: Option<DoubleHandler>,
    pub ansi: Option<StringHandler>,
    pub unicode: Option<StringHandler>,
    pub empty: Option<EmptyHandler>,
}

impl ValueMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integer(mut self, handler: IntegerHandler) -> Self {
        self.integer = Some(handler);
        self
    }

    pub fn unsigned(mut self, handler: UnsignedHandler) -> Self {
        self.unsigned = Some(handler);
        self
    }

    pub fn double(mut self, handler: DoubleHandler) -> Self {
        self.double = Some(handler);
        self
    }

    pub fn ansi(mut self, handler: StringHandler) -> Self {
        self.ansi = Some(handler);
        self
    }

    pub fn unicode(mut self, handler: StringHandler) -> Self {
        self.unicode = Some(handler);
        self
    }

    pub fn empty(mut self, handler: EmptyHandler) -> Self {
        self.empty = Some(handler);
        self
    }
}

static MATCHERS: OnceLock<HashMap<&'static str, ValueMatcher>> = OnceLock::new();

/// The shared matcher table
pub fn matchers() -> &'static HashMap<&'static str, ValueMatcher> {
    MATCHERS.get_or_init(build_matchers)
}

pub fn matcher_for(name: &str) -> Option<&'static ValueMatcher> {
    matchers().get(name)
}

fn select_side(processor: &mut EpochProcessor, side: PositionSide) -> Result<bool> {
    processor.state.selected_side = Some(side);
    Ok(true)
}

fn ordinate_absolute(
    processor: &mut EpochProcessor,
    ordinate: Ordinate,
    value: f64,
) -> Result<bool> {
    match processor.state.selected_position_mut() {
        Some(position) => {
            position.set_absolute(ordinate, value);
            Ok(true)
        }
        None => Ok(false),
    }
}

fn ordinate_offset(
    processor: &mut EpochProcessor,
    ordinate: Ordinate,
    offset_mm: i64,
) -> Result<bool> {
    Ok(processor
        .state
        .selected_position_mut()
        .is_some_and(|position| position.apply_offset(ordinate, offset_mm)))
}

fn ordinate_empty(processor: &mut EpochProcessor, ordinate: Ordinate) -> Result<bool> {
    match processor.state.selected_position_mut() {
        Some(position) => {
            position.clear(ordinate);
            Ok(true)
        }
        None => Ok(false),
    }
}

fn time(processor: &mut EpochProcessor, item: &DictionaryItem, value: u64) -> Result<bool> {
    match item.field_type {
        FieldType::UInt32 => processor.process_time_absolute(value),
        FieldType::UInt4 | FieldType::UInt8 => processor.process_time_offset(value),
        _ => Ok(false),
    }
}

fn week(processor: &mut EpochProcessor, _item: &DictionaryItem, value: u64) -> Result<bool> {
    match u32::try_from(value) {
        Ok(week) => processor.process_week(week),
        Err(_) => Ok(false),
    }
}

fn narrow_u8(value: u64) -> Option<u8> {
    u8::try_from(value).ok()
}

fn narrow_u16(value: u64) -> Option<u16> {
    u16::try_from(value).ok()
}

/// Store `value` if it narrows, otherwise reject
fn accept<T>(slot: &mut Option<T>, value: Option<T>) -> Result<bool> {
    match value {
        Some(value) => {
            *slot = Some(value);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Absolute value, signed offset and reset for a
/// [`TrackedValue`](crate::execution::processor_state::TrackedValue)
macro_rules! tracked {
    ($field:ident) => {
        ValueMatcher::new()
            .unsigned(|p, _, value| Ok(p.state.$field.set_absolute(value)))
            .integer(|p, offset| Ok(p.state.$field.apply_offset(offset)))
            .empty(|p| {
                p.state.$field.clear();
                Ok(true)
            })
    };
}

macro_rules! coded {
    ($field:ident, $kind:ty) => {
        ValueMatcher::new()
            .unsigned(|p, _, value| accept(&mut p.state.$field, <$kind>::from_code(value)))
    };
}

macro_rules! side {
    ($side:ident) => {
        ValueMatcher::new().empty(|p| select_side(p, PositionSide::$side))
    };
}

macro_rules! seed {
    ($field:ident) => {
        ValueMatcher::new().double(|p, v| accept(&mut p.state.$field, Some(v)))
    };
}

/// One of the four CCA corner values
macro_rules! corner {
    ($index:literal) => {
        ValueMatcher::new()
            .unsigned(|p, _, v| accept(&mut p.state.cca_corners[$index], narrow_u8(v)))
    };
}

macro_rules! small {
    ($field:ident, $narrow:ident) => {
        ValueMatcher::new().unsigned(|p, _, value| accept(&mut p.state.$field, $narrow(value)))
    };
}

macro_rules! marker {
    ($kind:expr) => {
        ValueMatcher::new().empty(|p| p.process_discrete_event($kind, None))
    };
}

fn build_matchers() -> HashMap<&'static str, ValueMatcher> {
    let mut table = HashMap::new();

    table.insert(names::TIME, ValueMatcher::new().unsigned(time).empty(|_| Ok(true)));
    table.insert(names::WEEK, ValueMatcher::new().unsigned(week));

    table.insert(names::BLADE_LEFT, side!(BladeLeft));
    table.insert(names::BLADE_RIGHT, side!(BladeRight));
    table.insert(names::TRACK_LEFT, side!(TrackLeft));
    table.insert(names::TRACK_RIGHT, side!(TrackRight));
    table.insert(names::WHEEL_LEFT, side!(WheelLeft));
    table.insert(names::WHEEL_RIGHT, side!(WheelRight));
    table.insert(names::REAR_LEFT, side!(RearLeft));
    table.insert(names::REAR_RIGHT, side!(RearRight));

    table.insert(
        names::EASTING,
        ValueMatcher::new()
            .double(|p, v| ordinate_absolute(p, Ordinate::Easting, v))
            .integer(|p, v| ordinate_offset(p, Ordinate::Easting, v))
            .empty(|p| ordinate_empty(p, Ordinate::Easting)),
    );
    table.insert(
        names::NORTHING,
        ValueMatcher::new()
            .double(|p, v| ordinate_absolute(p, Ordinate::Northing, v))
            .integer(|p, v| ordinate_offset(p, Ordinate::Northing, v))
            .empty(|p| ordinate_empty(p, Ordinate::Northing)),
    );
    table.insert(
        names::ELEVATION,
        ValueMatcher::new()
            .double(|p, v| ordinate_absolute(p, Ordinate::Elevation, v))
            .integer(|p, v| ordinate_offset(p, Ordinate::Elevation, v))
            .empty(|p| ordinate_empty(p, Ordinate::Elevation)),
    );

    table.insert(names::LATITUDE, seed!(seed_latitude));
    table.insert(names::LONGITUDE, seed!(seed_longitude));
    table.insert(names::HEIGHT, seed!(seed_height));

    table.insert(
        names::MACHINE_ID,
        ValueMatcher::new().ansi(|p, v| {
            p.state.hardware_id = v.to_string();
            Ok(true)
        }),
    );
    table.insert(
        names::APPLICATION_VERSION,
        ValueMatcher::new().ansi(|p, v| {
            p.state.application_version = v.to_string();
            Ok(true)
        }),
    );
    table.insert(
        names::MACHINE_TYPE,
        ValueMatcher::new().unsigned(|p, _, v| match narrow_u8(v) {
            Some(machine_type) => {
                p.state.machine_type = machine_type;
                Ok(true)
            }
            None => Ok(false),
        }),
    );
    table.insert(
        names::DEVICE_TYPE,
        ValueMatcher::new().unsigned(|p, _, v| match narrow_u8(v) {
            Some(device_type) => {
                p.state.device_type = device_type;
                Ok(true)
            }
            None => Ok(false),
        }),
    );
    table.insert(
        names::DESIGN,
        ValueMatcher::new()
            .ansi(|p, v| accept(&mut p.state.design_name, Some(v.to_string())))
            .unicode(|p, v| accept(&mut p.state.design_name, Some(v.to_string()))),
    );

    table.insert(names::CCV, tracked!(ccv));
    table.insert(names::MDP, tracked!(mdp));
    table.insert(names::RMV, tracked!(rmv));
    table.insert(names::FREQUENCY, tracked!(frequency));
    table.insert(names::AMPLITUDE, tracked!(amplitude));
    table.insert(names::TEMPERATURE, tracked!(temperature));

    table.insert(
        names::CCA,
        small!(cca, narrow_u8).empty(|p| {
            p.state.cca = None;
            Ok(true)
        }),
    );
    table.insert(names::CCA_LEFT_FRONT, corner!(0));
    table.insert(names::CCA_RIGHT_FRONT, corner!(1));
    table.insert(names::CCA_LEFT_REAR, corner!(2));
    table.insert(names::CCA_RIGHT_REAR, corner!(3));

    table.insert(names::TARGET_CCV, small!(target_ccv, narrow_u16));
    table.insert(names::TARGET_MDP, small!(target_mdp, narrow_u16));
    table.insert(names::TARGET_CCA, small!(target_cca, narrow_u8));
    table.insert(names::TARGET_PASS_COUNT, small!(target_pass_count, narrow_u16));
    table.insert(names::TEMPERATURE_WARNING_MIN, small!(temperature_warning_min, narrow_u16));
    table.insert(names::TEMPERATURE_WARNING_MAX, small!(temperature_warning_max, narrow_u16));

    table.insert(names::GEAR, coded!(gear, MachineGear));
    table.insert(names::ON_GROUND, coded!(on_ground, OnGroundState));
    table.insert(names::GPS_MODE, coded!(gps_mode, GpsMode));
    table.insert(names::VIBRATION_STATE, coded!(vibration_state, VibrationState));
    table.insert(
        names::ELEVATION_MAPPING_MODE,
        coded!(elevation_mapping_mode, ElevationMappingMode),
    );
    table.insert(names::POSITIONING_TECH, coded!(positioning_tech, PositioningTech));
    table.insert(names::COORDINATE_SYSTEM, coded!(coordinate_system, CoordinateSystemType));
    table.insert(
        names::GPS_ACCURACY,
        ValueMatcher::new().unsigned(|p, _, v| {
            accept(&mut p.state.gps_accuracy, narrow_u16(v).map(split_gps_accuracy_word))
        }),
    );
    table.insert(
        names::UTM_ZONE,
        ValueMatcher::new().unsigned(|p, _, v| {
            accept(&mut p.state.utm_zone, narrow_u8(v).filter(|zone| *zone <= 60))
        }),
    );

    table.insert(
        names::DISCRETE_EVENT,
        ValueMatcher::new().unsigned(|p, _, v| p.process_discrete_event_code(v)),
    );
    table.insert(names::MACHINE_STARTUP, marker!(DiscreteEventKind::MachineStartup));
    table.insert(names::MACHINE_SHUTDOWN, marker!(DiscreteEventKind::MachineShutdown));
    table.insert(names::MAP_RESET, marker!(DiscreteEventKind::MapReset));
    table.insert(names::UTS_MODE, marker!(DiscreteEventKind::UtsMode));
    table.insert(names::END_PROOFING, marker!(DiscreteEventKind::EndProofing));
    table.insert(
        names::START_PROOFING,
        ValueMatcher::new().ansi(|p, v| {
            p.process_discrete_event(DiscreteEventKind::StartProofing, Some(v.to_string()))
        }),
    );
    table.insert(
        names::START_PROOFING_TIME,
        ValueMatcher::new()
            .unsigned(|p, _, v| accept(&mut p.state.proofing_start_milliseconds, Some(v))),
    );
    table.insert(
        names::START_PROOFING_WEEK,
        ValueMatcher::new().unsigned(|p, _, v| {
            accept(&mut p.state.proofing_start_week, u32::try_from(v).ok())
        }),
    );

    table
}

/// Feeds decoded values through the matcher table into an [`EpochProcessor`]
pub struct TagValueMatcherSink<'p> {
    processor: &'p mut EpochProcessor,
    bound: HashMap<u32, &'static ValueMatcher>,
}

impl<'p> TagValueMatcherSink<'p> {
    pub fn new(processor: &'p mut EpochProcessor) -> Self {
        TagValueMatcherSink {
            processor,
            bound: HashMap::new(),
        }
    }

    fn matcher(&self, item: &DictionaryItem) -> Option<&'static ValueMatcher> {
        self.bound.get(&item.id).copied()
    }
}

impl TagValueSink for TagValueMatcherSink<'_> {
    fn starting(&mut self, dictionary: &TagDictionary) -> Result<bool> {
        self.bound = dictionary
            .iter()
            .filter_map(|item| matcher_for(&item.name).map(|matcher| (item.id, matcher)))
            .collect();
        Ok(true)
    }

    fn read_integer(&mut self, item: &DictionaryItem, value: i64) -> Result<bool> {
        let Some(matcher) = self.matcher(item) else { return Ok(true) };
        match matcher.integer {
            Some(handler) => handler(self.processor, value),
            None => Ok(false),
        }
    }

    fn read_unsigned_integer(&mut self, item: &DictionaryItem, value: u64) -> Result<bool> {
        let Some(matcher) = self.matcher(item) else { return Ok(true) };
        match matcher.unsigned {
            Some(handler) => handler(self.processor, item, value),
            None => Ok(false),
        }
    }

    fn read_double(&mut self, item: &DictionaryItem, value: f64) -> Result<bool> {
        let Some(matcher) = self.matcher(item) else { return Ok(true) };
        match matcher.double {
            Some(handler) => handler(self.processor, value),
            None => Ok(false),
        }
    }

    fn read_ansi_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool> {
        let Some(matcher) = self.matcher(item) else { return Ok(true) };
        match matcher.ansi {
            Some(handler) => handler(self.processor, value),
            None => Ok(false),
        }
    }

    fn read_unicode_string(&mut self, item: &DictionaryItem, value: &str) -> Result<bool> {
        let Some(matcher) = self.matcher(item) else { return Ok(true) };
        match matcher.unicode {
            Some(handler) => handler(self.processor, value),
            None => Ok(false),
        }
    }

    fn read_empty(&mut self, item: &DictionaryItem) -> Result<bool> {
        let Some(matcher) = self.matcher(item) else { return Ok(true) };
        match matcher.empty {
            Some(handler) => handler(self.processor),
            None => Ok(false),
        }
    }

    fn finishing(&mut self) -> Result<bool> {
        self.processor.finish()
    }

    fn rejection_reason(&self) -> Option<ReadResult> {
        self.processor.rejection()
    }
}
