use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::geometry::Xyz;

/// Identity of a machine that has contributed passes to a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: Uuid,
    pub name: String,
    pub machine_type: u8,
    pub device_type: u8,
    /// Provisional identity created when no asset id accompanied the file
    pub is_john_doe: bool,
    /// Position in the owning machine list; cell passes refer to machines by this index
    pub internal_index: u16,
    /// Hardware machine id embedded in the TAG file
    pub hardware_id: String,
    pub last_known_time: Option<DateTime<Utc>>,
    pub last_known_position: Option<Xyz>,
}

impl Machine {
    pub fn new(id: Uuid, name: &str, hardware_id: &str, is_john_doe: bool) -> Self {
        Machine {
            id,
            name: name.to_string(),
            machine_type: 0,
            device_type: 0,
            is_john_doe,
            internal_index: 0,
            hardware_id: hardware_id.to_string(),
            last_known_time: None,
            last_known_position: None,
        }
    }

    /// Keep the most recent of two sightings
    pub fn update_last_known(&mut self, time: Option<DateTime<Utc>>, position: Option<Xyz>) {
        if let Some(time) = time {
            if self.last_known_time.map_or(true, |known| time >= known) {
                self.last_known_time = Some(time);
                if position.is_some() {
                    self.last_known_position = position;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachinesList {
    machines: Vec<Machine>,
}

impl MachinesList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of `template` under the next internal index
    pub fn add(&mut self, template: &Machine) -> &mut Machine {
        let mut machine = template.clone();
        machine.internal_index = self.machines.len() as u16;
        self.machines.push(machine);
        let last = self.machines.len() - 1;
        &mut self.machines[last]
    }

    pub fn locate(&self, id: Uuid) -> Option<&Machine> {
        self.machines.iter().find(|machine| machine.id == id)
    }

    pub fn locate_john_doe(&self, hardware_id: &str) -> Option<&Machine> {
        self.machines
            .iter()
            .find(|machine| machine.is_john_doe && machine.hardware_id == hardware_id)
    }

    pub fn get(&self, internal_index: u16) -> Option<&Machine> {
        self.machines.get(internal_index as usize)
    }

    pub fn get_mut(&mut self, internal_index: u16) -> Option<&mut Machine> {
        self.machines.get_mut(internal_index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Machine> {
        self.machines.iter()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assigns_sequential_indices() {
        let mut list = MachinesList::new();
        let first = list.add(&Machine::new(Uuid::new_v4(), "Roller", "HW1", false)).internal_index;
        let second = list.add(&Machine::new(Uuid::new_v4(), "Dozer", "HW2", true)).internal_index;
        assert_eq!((first, second), (0, 1));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_john_doe_lookup_ignores_asset_machines() {
        let mut list = MachinesList::new();
        list.add(&Machine::new(Uuid::new_v4(), "Asset", "HW1", false));
        assert!(list.locate_john_doe("HW1").is_none());

        let john_doe = Machine::new(Uuid::new_v4(), "JohnDoe", "HW1", true);
        let id = john_doe.id;
        list.add(&john_doe);
        assert_eq!(list.locate_john_doe("HW1").map(|m| m.id), Some(id));
    }
}
