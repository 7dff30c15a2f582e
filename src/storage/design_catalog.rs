use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Design name ⇄ id mapping. Ids are never reused or reassigned once handed out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignCatalog {
    pub name_to_id: HashMap<String, u32>,
    pub id_to_name: HashMap<u32, String>,
    pub next_id: u32,
}

impl DesignCatalog {
    pub fn new() -> Self {
        DesignCatalog {
            name_to_id: HashMap::new(),
            id_to_name: HashMap::new(),
            next_id: 0,
        }
    }

    /// Id for `name`, assigning the next free id on first use
    pub fn encode(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.name_to_id.get(name) {
            id
        } else {
            let id = self.next_id;
            self.name_to_id.insert(name.to_string(), id);
            self.id_to_name.insert(id, name.to_string());
            self.next_id += 1;
            id
        }
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    pub fn decode(&self, id: u32) -> Option<&str> {
        self.id_to_name.get(&id).map(|s| s.as_str())
    }

    /// Names ordered by id
    pub fn names(&self) -> Vec<&str> {
        let mut entries: Vec<(&u32, &String)> = self.id_to_name.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, name)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }

    /// Add every design in `source` that is not already present. Returns source id → target id.
    pub fn merge_from(&mut self, source: &DesignCatalog) -> HashMap<u32, u32> {
        let mut source_ids: Vec<(&u32, &String)> = source.id_to_name.iter().collect();
        source_ids.sort_by_key(|(id, _)| **id);
        source_ids.into_iter().map(|(&source_id, name)| (source_id, self.encode(name))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_stable() {
        let mut catalog = DesignCatalog::new();
        let a = catalog.encode("Subgrade");
        let b = catalog.encode("Final surface");
        assert_eq!(catalog.encode("Subgrade"), a);
        assert_ne!(a, b);
        assert_eq!(catalog.decode(b), Some("Final surface"));
        assert_eq!(catalog.id_of("Missing"), None);
    }

    #[test]
    fn test_merge_never_duplicates_names() {
        let mut target = DesignCatalog::new();
        let target_b = target.encode("B");

        let mut source = DesignCatalog::new();
        let source_a = source.encode("A");
        let source_b = source.encode("B");

        let remap = target.merge_from(&source);

        assert_eq!(target.len(), 2);
        assert_eq!(remap[&source_b], target_b);
        assert_eq!(target.decode(remap[&source_a]), Some("A"));
        assert_eq!(target.names(), vec!["B", "A"]);
    }
}
