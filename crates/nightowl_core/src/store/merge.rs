//! Keyed upsert of incoming sessions into stored history.

use crate::model::sleep::{DedupKey, SleepRecord};
use std::collections::{BTreeMap, BTreeSet};

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeOutcome {
    /// Merged history, sorted by dedup key.
    pub records: Vec<SleepRecord>,
    /// Incoming keys that were not stored before.
    pub inserted: usize,
    /// Stored records replaced by a differing incoming version.
    pub replaced: usize,
}

impl MergeOutcome {
    pub fn into_records(self) -> Vec<SleepRecord> {
        self.records
    }
}

/// Merges `incoming` into `existing`.
///
/// With `overwrite` the result is exactly `incoming`. Otherwise incoming
/// records replace stored records sharing their dedup key and new keys are
/// added; untouched stored records are kept as-is. In both modes colliding
/// keys resolve to the last record seen.
pub fn merge(existing: &[SleepRecord], incoming: &[SleepRecord], overwrite: bool) -> MergeOutcome {
    let mut by_key: BTreeMap<DedupKey, SleepRecord> = BTreeMap::new();
    if !overwrite {
        for record in existing {
            by_key.insert(record.dedup_key(), record.clone());
        }
    }

    let mut inserted = 0;
    let mut replaced = 0;
    let mut seen = BTreeSet::new();
    for record in incoming {
        let key = record.dedup_key();
        let previous = by_key.insert(key, record.clone());
        // Counts refer to the stored state, not to repeats inside `incoming`.
        if seen.insert(key) {
            match previous {
                None => inserted += 1,
                Some(stored) if stored != *record => replaced += 1,
                Some(_) => {}
            }
        }
    }

    MergeOutcome {
        records: by_key.into_values().collect(),
        inserted,
        replaced,
    }
}
