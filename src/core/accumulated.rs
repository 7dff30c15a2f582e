//! Time-ordered attribute series with carry-forward lookups.
//!
//! A series is a list of `(time, value)` entries in non-decreasing time order. Adding an entry
//! earlier than the latest one is rejected with [`Error::OutOfOrderSeries`]; equal times are
//! accepted and the later entry wins for lookups at that time. Unordered data (for example two
//! series being merged) goes through [`AccumulatedSeries::from_unsorted`] or
//! [`AccumulatedSeries::merge_from`], which stable-sort by time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatedSeries<T> {
    entries: Vec<(DateTime<Utc>, T)>,
}

impl<T> Default for AccumulatedSeries<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> AccumulatedSeries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from entries in any order
    pub fn from_unsorted(mut entries: Vec<(DateTime<Utc>, T)>) -> Self {
        entries.sort_by_key(|(time, _)| *time);
        Self { entries }
    }

    pub fn add(&mut self, time: DateTime<Utc>, value: T) -> Result<()> {
        if let Some(latest) = self.latest_time() {
            if time < latest {
                return Err(Error::OutOfOrderSeries(format!(
                    "entry at {} precedes latest entry at {}",
                    time, latest
                )));
            }
        }
        self.entries.push((time, value));
        Ok(())
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.last().map(|(_, value)| value)
    }

    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|(time, _)| *time)
    }

    pub fn first(&self) -> Option<&(DateTime<Utc>, T)> {
        self.entries.first()
    }

    /// Value of the last entry at or before `time`, or of the first entry if `time` precedes
    /// every entry. `None` only when the series is empty.
    pub fn value_at(&self, time: DateTime<Utc>) -> Option<&T> {
        let after = self.entries.partition_point(|(entry_time, _)| *entry_time <= time);
        let index = after.saturating_sub(1);
        self.entries.get(index).map(|(_, value)| value)
    }

    /// Keep only the most recent entry
    pub fn discard_all_but_latest(&mut self) {
        if self.entries.len() > 1 {
            let keep_from = self.entries.len() - 1;
            self.entries.drain(..keep_from);
        }
    }

    /// Add every entry of `other`, restoring time order. Entries with equal times keep
    /// `self`'s entries ahead of `other`'s.
    pub fn merge_from(&mut self, other: &AccumulatedSeries<T>) {
        self.entries.extend(other.entries.iter().cloned());
        self.entries.sort_by_key(|(time, _)| *time);
    }

    /// Replace the value of the most recent entry
    pub fn replace_latest(&mut self, value: T) -> bool {
        match self.entries.last_mut() {
            Some(last) => {
                last.1 = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn map<U: Clone>(&self, mut f: impl FnMut(&T) -> U) -> AccumulatedSeries<U> {
        AccumulatedSeries {
            entries: self.entries.iter().map(|(time, value)| (*time, f(value))).collect(),
        }
    }
}

impl<T: Clone + PartialEq> AccumulatedSeries<T> {
    /// Drop entries whose value repeats the entry before them
    pub fn collate(&mut self) {
        self.entries.dedup_by(|later, earlier| later.1 == earlier.1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn test_empty_series_has_no_value() {
        let series: AccumulatedSeries<u16> = AccumulatedSeries::new();
        assert_eq!(series.value_at(at(0)), None);
        assert_eq!(series.latest(), None);
    }

    #[test]
    fn test_single_entry_carries_both_ways() {
        let mut series = AccumulatedSeries::new();
        series.add(at(10), 42u16).unwrap();
        assert_eq!(series.value_at(at(10)), Some(&42));
        assert_eq!(series.value_at(at(100)), Some(&42));
        assert_eq!(series.value_at(at(-100)), Some(&42));
    }

    #[test]
    fn test_value_at_picks_nearest_preceding() {
        let mut series = AccumulatedSeries::new();
        series.add(at(0), 1).unwrap();
        series.add(at(10), 2).unwrap();
        series.add(at(10), 3).unwrap();
        series.add(at(20), 4).unwrap();
        assert_eq!(series.value_at(at(5)), Some(&1));
        assert_eq!(series.value_at(at(10)), Some(&3));
        assert_eq!(series.value_at(at(19)), Some(&3));
        assert_eq!(series.value_at(at(25)), Some(&4));
        assert_eq!(series.latest(), Some(&4));
    }

    #[test]
    fn test_out_of_order_add_is_rejected() {
        let mut series = AccumulatedSeries::new();
        series.add(at(10), 1).unwrap();
        let err = series.add(at(5), 2).unwrap_err();
        assert!(matches!(err, Error::OutOfOrderSeries(_)));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_discard_all_but_latest() {
        let mut series = AccumulatedSeries::new();
        for i in 0..5 {
            series.add(at(i), i).unwrap();
        }
        series.discard_all_but_latest();
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest(), Some(&4));
        assert_eq!(series.value_at(at(0)), Some(&4));
    }

    #[test]
    fn test_merge_and_collate() {
        let mut target = AccumulatedSeries::from_unsorted(vec![(at(20), 'b'), (at(0), 'a')]);
        let mut source = AccumulatedSeries::new();
        source.add(at(10), 'a').unwrap();
        source.add(at(30), 'c').unwrap();

        target.merge_from(&source);
        let times: Vec<_> = target.iter().map(|(t, v)| (*t, *v)).collect();
        assert_eq!(times, vec![(at(0), 'a'), (at(10), 'a'), (at(20), 'b'), (at(30), 'c')]);

        target.collate();
        assert_eq!(target.len(), 3);
    }
}
