use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one queued TAG file. JohnDoe submissions carry the nil asset id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferQueueKey {
    pub file_name: String,
    pub project_id: Uuid,
    pub asset_id: Uuid,
}

impl BufferQueueKey {
    pub fn new(file_name: &str, project_id: Uuid, asset_id: Option<Uuid>) -> Self {
        BufferQueueKey {
            file_name: file_name.to_string(),
            project_id,
            asset_id: asset_id.unwrap_or_else(Uuid::nil),
        }
    }

    /// `None` for JohnDoe submissions
    pub fn asset(&self) -> Option<Uuid> {
        if self.asset_id.is_nil() {
            None
        } else {
            Some(self.asset_id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferQueueEntry {
    pub content: Vec<u8>,
    pub originating_org_id: Option<String>,
    pub treat_as_john_doe: bool,
    pub inserted: DateTime<Utc>,
}

impl BufferQueueEntry {
    pub fn new(content: Vec<u8>) -> Self {
        BufferQueueEntry {
            content,
            originating_org_id: None,
            treat_as_john_doe: false,
            inserted: Utc::now(),
        }
    }
}

/// File contents and submission metadata for every queued key
#[derive(Debug, Default)]
pub struct BufferQueue {
    entries: Mutex<HashMap<BufferQueueKey, BufferQueueEntry>>,
}

impl BufferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `entry`. Returns false if the key is already queued; the existing entry is kept.
    pub fn add(&self, key: BufferQueueKey, entry: BufferQueueEntry) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, entry);
        true
    }

    pub fn take(&self, key: &BufferQueueKey) -> Option<BufferQueueEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key)
    }

    pub fn contains(&self, key: &BufferQueueKey) -> bool {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_john_doe_key_has_nil_asset() {
        let key = BufferQueueKey::new("a.tag", Uuid::new_v4(), None);
        assert!(key.asset_id.is_nil());
        assert_eq!(key.asset(), None);
    }

    #[test]
    fn test_duplicate_key_keeps_first_entry() {
        let queue = BufferQueue::new();
        let key = BufferQueueKey::new("a.tag", Uuid::new_v4(), Some(Uuid::new_v4()));

        assert!(queue.add(key.clone(), BufferQueueEntry::new(vec![1])));
        assert!(!queue.add(key.clone(), BufferQueueEntry::new(vec![2])));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.take(&key).unwrap().content, vec![1]);
        assert!(queue.is_empty());
        assert!(queue.take(&key).is_none());
    }
}
