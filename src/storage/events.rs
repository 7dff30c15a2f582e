//! Per-machine production event lists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::accumulated::AccumulatedSeries;
use crate::core::types::{
    ElevationMappingMode, GpsAccuracy, GpsMode, MachineGear, MachineStartupShutdown, OnGroundState,
    PositioningTech, RecordedData, VibrationState,
};
use crate::error::Result;

/// A machine state-change series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventList<T> {
    series: AccumulatedSeries<T>,
}

impl<T> Default for EventList<T> {
    fn default() -> Self {
        EventList {
            series: AccumulatedSeries::default(),
        }
    }
}

impl<T: Clone + PartialEq> EventList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state change. A value equal to the latest one is dropped; a value at the same time
    /// as the latest replaces it.
    pub fn put(&mut self, time: DateTime<Utc>, value: T) -> Result<()> {
        if self.series.latest() == Some(&value) {
            return Ok(());
        }
        if self.series.latest_time() == Some(time) {
            self.series.replace_latest(value);
            return Ok(());
        }
        self.series.add(time, value)
    }

    /// Record an occurrence. Every call adds an entry, even if it repeats the previous one.
    pub fn push_occurrence(&mut self, time: DateTime<Utc>, value: T) -> Result<()> {
        self.series.add(time, value)
    }

    pub fn value_at(&self, time: DateTime<Utc>) -> Option<&T> {
        self.series.value_at(time)
    }

    pub fn latest(&self) -> Option<&T> {
        self.series.latest()
    }

    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.series.latest_time()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, T)> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Merge and re-sort by time. State lists are collated so a merged list never repeats a value
    /// in consecutive entries; occurrence lists keep every entry.
    pub fn merge_from(&mut self, source: &EventList<T>, collate: bool) {
        self.series.merge_from(&source.series);
        if collate {
            self.series.collate();
        }
    }

    pub fn map_values(&self, f: impl FnMut(&T) -> T) -> EventList<T> {
        EventList {
            series: self.series.map(f),
        }
    }
}

/// Named quality-assurance window flagged by the operator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofingRun {
    pub machine_index: u16,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Event lists recorded for one machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionEventLists {
    pub gps_mode: EventList<GpsMode>,
    /// Accuracy class and error limit in millimetres
    pub gps_accuracy: EventList<(GpsAccuracy, u16)>,
    pub positioning_tech: EventList<PositioningTech>,
    pub on_ground: EventList<OnGroundState>,
    pub elevation_mapping_mode: EventList<ElevationMappingMode>,
    /// Design catalog ids
    pub design_name_id: EventList<u32>,
    pub machine_gear: EventList<MachineGear>,
    pub vibration_state: EventList<VibrationState>,
    pub target_ccv: EventList<u16>,
    pub target_mdp: EventList<u16>,
    pub target_cca: EventList<u8>,
    pub target_pass_count: EventList<u16>,
    /// Minimum and maximum temperature warning levels
    pub temperature_warning_levels: EventList<(u16, u16)>,
    /// Each reset carries the design id in force when it happened
    pub map_resets: EventList<Option<u32>>,
    pub machine_startup_shutdown: EventList<MachineStartupShutdown>,
    pub start_end_recorded_data: EventList<RecordedData>,
}

impl ProductionEventLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every list from `source`. Design ids in the source are rewritten through
    /// `design_remap` first; ids missing from the map are kept.
    pub fn merge_from(&mut self, source: &ProductionEventLists, design_remap: &HashMap<u32, u32>) {
        let remap = |id: &u32| design_remap.get(id).copied().unwrap_or(*id);
        self.design_name_id.merge_from(&source.design_name_id.map_values(remap), true);
        self.map_resets
            .merge_from(&source.map_resets.map_values(|id| id.map(|id| remap(&id))), false);

        self.gps_mode.merge_from(&source.gps_mode, true);
        self.gps_accuracy.merge_from(&source.gps_accuracy, true);
        self.positioning_tech.merge_from(&source.positioning_tech, true);
        self.on_ground.merge_from(&source.on_ground, true);
        self.elevation_mapping_mode.merge_from(&source.elevation_mapping_mode, true);
        self.machine_gear.merge_from(&source.machine_gear, true);
        self.vibration_state.merge_from(&source.vibration_state, true);
        self.target_ccv.merge_from(&source.target_ccv, true);
        self.target_mdp.merge_from(&source.target_mdp, true);
        self.target_cca.merge_from(&source.target_cca, true);
        self.target_pass_count.merge_from(&source.target_pass_count, true);
        self.temperature_warning_levels.merge_from(&source.temperature_warning_levels, true);
        self.machine_startup_shutdown.merge_from(&source.machine_startup_shutdown, false);
        self.start_end_recorded_data.merge_from(&source.start_end_recorded_data, false);
    }

    pub fn total_event_count(&self) -> usize {
        self.gps_mode.len()
            + self.gps_accuracy.len()
            + self.positioning_tech.len()
            + self.on_ground.len()
            + self.elevation_mapping_mode.len()
            + self.design_name_id.len()
            + self.machine_gear.len()
            + self.vibration_state.len()
            + self.target_ccv.len()
            + self.target_mdp.len()
            + self.target_cca.len()
            + self.target_pass_count.len()
            + self.temperature_warning_levels.len()
            + self.map_resets.len()
            + self.machine_startup_shutdown.len()
            + self.start_end_recorded_data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 9, 14, 7, 30, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn test_put_skips_repeats_and_replaces_same_time() {
        let mut list = EventList::new();
        list.put(at(0), GpsMode::Fixed).unwrap();
        list.put(at(1), GpsMode::Fixed).unwrap();
        assert_eq!(list.len(), 1);

        list.put(at(2), GpsMode::Float).unwrap();
        list.put(at(2), GpsMode::Autonomous).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.latest(), Some(&GpsMode::Autonomous));
        assert_eq!(list.value_at(at(1)), Some(&GpsMode::Fixed));
    }

    #[test]
    fn test_push_occurrence_keeps_repeats() {
        let mut list = EventList::new();
        list.push_occurrence(at(0), MachineStartupShutdown::Startup).unwrap();
        list.push_occurrence(at(5), MachineStartupShutdown::Startup).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_merge_remaps_design_ids_and_sorts() {
        let mut target = ProductionEventLists::new();
        target.design_name_id.put(at(10), 0).unwrap();

        let mut source = ProductionEventLists::new();
        source.design_name_id.put(at(0), 0).unwrap();
        source.design_name_id.put(at(20), 1).unwrap();
        source.map_resets.push_occurrence(at(5), Some(1)).unwrap();

        let remap = HashMap::from([(0, 4), (1, 0)]);
        target.merge_from(&source, &remap);

        let designs: Vec<(DateTime<Utc>, u32)> = target.design_name_id.iter().copied().collect();
        assert_eq!(designs, vec![(at(0), 4), (at(10), 0)]);
        assert_eq!(target.map_resets.latest(), Some(&Some(0)));
    }
}
