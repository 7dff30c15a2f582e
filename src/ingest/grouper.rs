use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::aggregation::scheduler::{AdmissionToken, IntegrationScheduler};
use crate::ingest::buffer_queue::BufferQueueKey;

#[derive(Debug)]
struct Bucket {
    project_id: Uuid,
    asset_id: Uuid,
    keys: VecDeque<BufferQueueKey>,
}

/// Groups queued files into per-`(project, asset)` batches.
///
/// Buckets are served in insertion order. A bucket that still holds keys after an extraction
/// moves to the back, so one busy machine cannot starve the others.
#[derive(Debug)]
pub struct BufferQueueGrouper {
    buckets: Mutex<VecDeque<Bucket>>,
    max_grouped_tag_files: usize,
}

impl BufferQueueGrouper {
    pub fn new(max_grouped_tag_files: usize) -> Self {
        BufferQueueGrouper {
            buckets: Mutex::new(VecDeque::new()),
            max_grouped_tag_files: max_grouped_tag_files.max(1),
        }
    }

    pub fn max_grouped_tag_files(&self) -> usize {
        self.max_grouped_tag_files
    }

    pub fn add(&self, key: BufferQueueKey) {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let existing = buckets
            .iter_mut()
            .find(|b| b.project_id == key.project_id && b.asset_id == key.asset_id);
        match existing {
            Some(bucket) => bucket.keys.push_back(key),
            None => buckets.push_back(Bucket {
                project_id: key.project_id,
                asset_id: key.asset_id,
                keys: VecDeque::from([key]),
            }),
        }
    }

    /// Remove one batch from the first bucket whose project is not in `avoid`
    pub fn extract(&self, avoid: &HashSet<Uuid>) -> Option<(Uuid, Vec<BufferQueueKey>)> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let position = buckets
            .iter()
            .position(|b| !b.keys.is_empty() && !avoid.contains(&b.project_id))?;
        self.take_batch(&mut buckets, position)
    }

    /// Remove one batch from the first bucket whose project `scheduler` admits, returning the
    /// claim with it. Selection and admission happen under the grouper lock, so two callers can
    /// never extract batches for the same project at once.
    pub fn extract_admitted(
        &self,
        scheduler: &IntegrationScheduler,
    ) -> Option<(AdmissionToken, Vec<BufferQueueKey>)> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let (position, token) = buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.keys.is_empty())
            .find_map(|(position, b)| {
                scheduler.try_admit(b.project_id).map(|token| (position, token))
            })?;
        let (_, batch) = self.take_batch(&mut buckets, position)?;
        Some((token, batch))
    }

    fn take_batch(
        &self,
        buckets: &mut VecDeque<Bucket>,
        position: usize,
    ) -> Option<(Uuid, Vec<BufferQueueKey>)> {
        let mut bucket = buckets.remove(position)?;

        let count = bucket.keys.len().min(self.max_grouped_tag_files);
        let batch: Vec<BufferQueueKey> = bucket.keys.drain(..count).collect();
        let project = bucket.project_id;
        debug!(
            project = %project,
            asset = %bucket.asset_id,
            files = batch.len(),
            remaining = bucket.keys.len(),
            "Extracted batch"
        );

        if !bucket.keys.is_empty() {
            buckets.push_back(bucket);
        }
        Some((project, batch))
    }

    /// Number of queued keys across all buckets
    pub fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|b| b.keys.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(project: Uuid, asset: Option<Uuid>, count: usize) -> Vec<BufferQueueKey> {
        (0..count).map(|i| BufferQueueKey::new(&format!("file{i}.tag"), project, asset)).collect()
    }

    #[test]
    fn test_two_full_batches_then_none() {
        let grouper = BufferQueueGrouper::new(5);
        let project = Uuid::new_v4();
        for key in keys(project, Some(Uuid::new_v4()), 10) {
            grouper.add(key);
        }

        let none = HashSet::new();
        let (p1, first) = grouper.extract(&none).unwrap();
        let (p2, second) = grouper.extract(&none).unwrap();
        assert_eq!((p1, p2), (project, project));
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 5);
        assert_eq!(first[0].file_name, "file0.tag");
        assert_eq!(second[0].file_name, "file5.tag");
        assert!(grouper.extract(&none).is_none());
    }

    #[test]
    fn test_avoided_project_is_skipped() {
        let grouper = BufferQueueGrouper::new(5);
        let busy = Uuid::new_v4();
        for key in keys(busy, None, 3) {
            grouper.add(key);
        }

        let avoid = HashSet::from([busy]);
        assert!(grouper.extract(&avoid).is_none());
        assert_eq!(grouper.len(), 3);

        let idle = Uuid::new_v4();
        grouper.add(BufferQueueKey::new("other.tag", idle, None));
        let (project, batch) = grouper.extract(&avoid).unwrap();
        assert_eq!(project, idle);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_assets_are_batched_separately() {
        let grouper = BufferQueueGrouper::new(10);
        let project = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        grouper.add(BufferQueueKey::new("a1.tag", project, Some(a)));
        grouper.add(BufferQueueKey::new("b1.tag", project, Some(b)));
        grouper.add(BufferQueueKey::new("a2.tag", project, Some(a)));

        let (_, first) = grouper.extract(&HashSet::new()).unwrap();
        assert!(first.iter().all(|k| k.asset_id == a));
        assert_eq!(first.len(), 2);
        let (_, second) = grouper.extract(&HashSet::new()).unwrap();
        assert_eq!(second[0].asset_id, b);
    }

    #[test]
    fn test_admitted_extraction_claims_project() {
        let grouper = BufferQueueGrouper::new(10);
        let scheduler = IntegrationScheduler::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        grouper.add(BufferQueueKey::new("a.tag", first, Some(Uuid::new_v4())));
        grouper.add(BufferQueueKey::new("b.tag", first, Some(Uuid::new_v4())));
        grouper.add(BufferQueueKey::new("c.tag", second, None));

        let (token, batch) = grouper.extract_admitted(&scheduler).unwrap();
        assert_eq!(token.project(), first);
        assert_eq!(batch[0].file_name, "a.tag");
        assert!(scheduler.is_integrating(first));

        let (other, batch) = grouper.extract_admitted(&scheduler).unwrap();
        assert_eq!(other.project(), second);
        assert_eq!(batch[0].file_name, "c.tag");
        assert!(grouper.extract_admitted(&scheduler).is_none());
        assert_eq!(grouper.len(), 1);

        drop(token);
        let (token, batch) = grouper.extract_admitted(&scheduler).unwrap();
        assert_eq!(token.project(), first);
        assert_eq!(batch[0].file_name, "b.tag");
    }

    #[test]
    fn test_concurrent_extraction_never_shares_a_project() {
        let grouper = std::sync::Arc::new(BufferQueueGrouper::new(1));
        let scheduler = IntegrationScheduler::new();
        let project = Uuid::new_v4();
        for key in keys(project, None, 8) {
            grouper.add(key);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let grouper = std::sync::Arc::clone(&grouper);
                let scheduler = scheduler.clone();
                std::thread::spawn(move || grouper.extract_admitted(&scheduler))
            })
            .collect();
        let claimed: Vec<_> = handles.into_iter().filter_map(|h| h.join().unwrap()).collect();

        assert_eq!(claimed.len(), 1);
        assert_eq!(grouper.len(), 7);
    }
}
