//! Per-tile completion markers and the run-summary record.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of all completion markers.
pub const COMPLETED_PREFIX: &str = "_completed/";

/// Key of the most recent run summary.
pub const RUN_SUMMARY_KEY: &str = "_runs/latest.json";

/// Written after a tile's region is fully stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub tile: usize,
    pub row_start: usize,
    pub row_end: usize,
    pub completed_at: DateTime<Utc>,
}

impl CompletionMarker {
    pub fn new(tile: usize, rows: Range<usize>) -> Self {
        Self {
            tile,
            row_start: rows.start,
            row_end: rows.end,
            completed_at: Utc::now(),
        }
    }

    pub fn rows(&self) -> Range<usize> {
        self.row_start..self.row_end
    }

    /// Store key of the marker for `tile`.
    pub fn key(tile: usize) -> String {
        format!("{}tile_{:05}.json", COMPLETED_PREFIX, tile)
    }
}
