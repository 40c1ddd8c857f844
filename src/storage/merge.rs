//! Additive merge of discovered matches into the index.
//!
//! Rules:
//! - rows are never removed
//! - a real row is never overwritten
//! - a placeholder row is replaced by the first real row for its id
//!
//! Keys are compared in normalized form so ids survive float round-trips.

use std::collections::HashMap;

use crate::types::MatchRecord;

/// What a merge changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    /// Match ids that were not in the index
    pub added: usize,
    /// Placeholder rows upgraded with API metadata
    pub updated: usize,
}

impl MergeCounts {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0
    }
}

/// Merge `discovered` into `existing`.
///
/// Existing order is kept; upgrades happen in place and new ids are
/// appended in discovery order.
pub fn merge(
    existing: Vec<MatchRecord>,
    discovered: Vec<MatchRecord>,
) -> (Vec<MatchRecord>, MergeCounts) {
    let mut merged = existing;
    let mut counts = MergeCounts::default();

    let mut positions: HashMap<String, usize> = HashMap::with_capacity(merged.len());
    for (i, row) in merged.iter_mut().enumerate() {
        row.match_id = row.key();
        positions.entry(row.match_id.clone()).or_insert(i);
    }

    for mut row in discovered {
        let key = row.key();
        row.match_id = key.clone();

        match positions.get(&key) {
            None => {
                positions.insert(key, merged.len());
                merged.push(row);
                counts.added += 1;
            }
            Some(&i) => {
                if merged[i].is_placeholder() && !row.is_placeholder() {
                    merged[i] = row;
                    counts.updated += 1;
                }
            }
        }
    }

    (merged, counts)
}
