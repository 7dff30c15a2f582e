//! The field-and-type dictionary that names every value in a TAG file

use std::collections::HashMap;

/// Wire type of a dictionary entry, stored as a single nybble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int4,
    UInt4,
    Int8,
    UInt8,
    Int12,
    UInt12,
    Int16,
    UInt16,
    Int32,
    UInt32,
    IeeeDouble,
    AnsiString,
    UnicodeString,
    Empty,
}

/// The sink callback a field type is delivered through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    UnsignedInteger,
    Double,
    AnsiString,
    UnicodeString,
    Empty,
}

impl FieldType {
    pub fn from_code(code: u8) -> Option<Self> {
        let field_type = match code {
            0 => FieldType::Int4,
            1 => FieldType::UInt4,
            2 => FieldType::Int8,
            3 => FieldType::UInt8,
            4 => FieldType::Int12,
            5 => FieldType::UInt12,
            6 => FieldType::Int16,
            7 => FieldType::UInt16,
            8 => FieldType::Int32,
            9 => FieldType::UInt32,
            10 => FieldType::IeeeDouble,
            11 => FieldType::AnsiString,
            12 => FieldType::UnicodeString,
            13 => FieldType::Empty,
            _ => return None,
        };
        Some(field_type)
    }

    pub fn code(self) -> u8 {
        match self {
            FieldType::Int4 => 0,
            FieldType::UInt4 => 1,
            FieldType::Int8 => 2,
            FieldType::UInt8 => 3,
            FieldType::Int12 => 4,
            FieldType::UInt12 => 5,
            FieldType::Int16 => 6,
            FieldType::UInt16 => 7,
            FieldType::Int32 => 8,
            FieldType::UInt32 => 9,
            FieldType::IeeeDouble => 10,
            FieldType::AnsiString => 11,
            FieldType::UnicodeString => 12,
            FieldType::Empty => 13,
        }
    }

    /// Width in nybbles of fixed-size integer types
    pub fn integer_nybbles(self) -> Option<usize> {
        match self {
            FieldType::Int4 | FieldType::UInt4 => Some(1),
            FieldType::Int8 | FieldType::UInt8 => Some(2),
            FieldType::Int12 | FieldType::UInt12 => Some(3),
            FieldType::Int16 | FieldType::UInt16 => Some(4),
            FieldType::Int32 | FieldType::UInt32 => Some(8),
            _ => None,
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            FieldType::Int4
            | FieldType::Int8
            | FieldType::Int12
            | FieldType::Int16
            | FieldType::Int32 => ValueKind::Integer,
            FieldType::UInt4
            | FieldType::UInt8
            | FieldType::UInt12
            | FieldType::UInt16
            | FieldType::UInt32 => ValueKind::UnsignedInteger,
            FieldType::IeeeDouble => ValueKind::Double,
            FieldType::AnsiString => ValueKind::AnsiString,
            FieldType::UnicodeString => ValueKind::UnicodeString,
            FieldType::Empty => ValueKind::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryItem {
    pub name: String,
    pub field_type: FieldType,
    pub id: u32,
}

impl DictionaryItem {
    pub fn new(name: &str, field_type: FieldType, id: u32) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            id,
        }
    }
}

/// Dictionary items keyed by id, remembering the order they were declared in
#[derive(Debug, Default, Clone)]
pub struct TagDictionary {
    items: HashMap<u32, DictionaryItem>,
    order: Vec<u32>,
}

impl TagDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id is already taken
    pub fn add(&mut self, item: DictionaryItem) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.order.push(item.id);
        self.items.insert(item.id, item);
        true
    }

    pub fn get(&self, id: u32) -> Option<&DictionaryItem> {
        self.items.get(&id)
    }

    pub fn find(&self, name: &str, field_type: FieldType) -> Option<&DictionaryItem> {
        self.iter().find(|item| item.name == name && item.field_type == field_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DictionaryItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_are_stable() {
        for code in 0..=13u8 {
            let field_type = FieldType::from_code(code).unwrap();
            assert_eq!(field_type.code(), code);
        }
        assert_eq!(FieldType::from_code(14), None);
        assert_eq!(FieldType::UInt12.integer_nybbles(), Some(3));
        assert_eq!(FieldType::IeeeDouble.integer_nybbles(), None);
        assert_eq!(FieldType::Int16.kind(), ValueKind::Integer);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut dictionary = TagDictionary::new();
        assert!(dictionary.add(DictionaryItem::new("TIME", FieldType::UInt32, 1)));
        assert!(!dictionary.add(DictionaryItem::new("WEEK", FieldType::UInt16, 1)));
        assert!(dictionary.add(DictionaryItem::new("TIME", FieldType::UInt4, 2)));
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.find("TIME", FieldType::UInt4).map(|i| i.id), Some(2));
    }
}
