//! Record of which latitude rows of a cutout have prepared features.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Key of the prepared-ranges record inside the cutout store.
pub const PREPARED_KEY: &str = "_prepared.json";

/// Sorted, non-overlapping, non-adjacent row ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedRanges {
    ranges: Vec<(usize, usize)>,
}

impl PreparedRanges {
    /// Whether every row of `rows` is prepared. Empty ranges always are.
    pub fn covers(&self, rows: &Range<usize>) -> bool {
        if rows.is_empty() {
            return true;
        }
        self.ranges
            .iter()
            .any(|&(start, end)| start <= rows.start && rows.end <= end)
    }

    /// Add `rows`, merging with overlapping or touching ranges.
    pub fn insert(&mut self, rows: Range<usize>) {
        if rows.is_empty() {
            return;
        }

        let (mut start, mut end) = (rows.start, rows.end);
        self.ranges.retain(|&(s, e)| {
            if e < start || s > end {
                true
            } else {
                start = start.min(s);
                end = end.max(e);
                false
            }
        });
        let pos = self.ranges.partition_point(|&(s, _)| s < start);
        self.ranges.insert(pos, (start, end));
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.ranges.iter().map(|&(s, e)| s..e)
    }

    /// Total number of prepared rows.
    pub fn row_count(&self) -> usize {
        self.ranges.iter().map(|&(s, e)| e - s).sum()
    }
}
