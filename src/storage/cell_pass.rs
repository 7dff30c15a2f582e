use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{GpsMode, MachineGear, OnGroundState};

/// One recorded visit of a machine over a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellPass {
    pub time: DateTime<Utc>,
    pub height: f32,
    /// Index of the machine in the owning model's machine list
    pub machine_index: u16,
    pub ccv: Option<u16>,
    pub mdp: Option<u16>,
    pub rmv: Option<u16>,
    pub frequency: Option<u16>,
    pub amplitude: Option<u16>,
    pub temperature: Option<u16>,
    pub cca: Option<u8>,
    pub gps_mode: Option<GpsMode>,
    pub gear: Option<MachineGear>,
    pub on_ground: Option<OnGroundState>,
    /// Metres per second
    pub machine_speed: f64,
}

impl CellPass {
    /// A pass with no attribute values
    pub fn new(time: DateTime<Utc>, height: f32, machine_index: u16) -> Self {
        CellPass {
            time,
            height,
            machine_index,
            ccv: None,
            mdp: None,
            rmv: None,
            frequency: None,
            amplitude: None,
            temperature: None,
            cca: None,
            gps_mode: None,
            gear: None,
            on_ground: None,
            machine_speed: 0.0,
        }
    }
}

/// Passes over a single cell, kept in non-decreasing time order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    passes: Vec<CellPass>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pass after every pass at or before its time
    pub fn add_pass(&mut self, pass: CellPass) {
        match self.passes.last() {
            Some(last) if last.time > pass.time => {
                let position = self.passes.partition_point(|p| p.time <= pass.time);
                self.passes.insert(position, pass);
            }
            _ => self.passes.push(pass),
        }
    }

    /// Merge another cell's passes, rewriting machine indices through `remap_machine`
    pub fn integrate(&mut self, source: &Cell, remap_machine: impl Fn(u16) -> u16) -> usize {
        for pass in &source.passes {
            let mut pass = *pass;
            pass.machine_index = remap_machine(pass.machine_index);
            self.add_pass(pass);
        }
        source.passes.len()
    }

    pub fn passes(&self) -> &[CellPass] {
        &self.passes
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn latest_pass(&self) -> Option<&CellPass> {
        self.passes.last()
    }

    pub fn is_time_ordered(&self) -> bool {
        self.passes.windows(2).all(|pair| pair[0].time <= pair[1].time)
    }
}
