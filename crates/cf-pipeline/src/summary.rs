//! Run summaries and store status reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cf_store::{CfStore, CompletionMarker};

use crate::error::{PipelineError, Stage};

/// A tile that failed, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileFailure {
    pub tile: usize,
    pub stage: Stage,
    pub cause: String,
}

/// Outcome of a run, per tile index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub written: Vec<usize>,
    pub skipped: Vec<usize>,
    pub failed: Vec<TileFailure>,
    /// Selected tiles left untouched after a fail-fast stop or an abort.
    pub pending: Vec<usize>,
    /// Tiles in the full partition.
    pub total_tiles: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(total_tiles: usize) -> Self {
        Self {
            written: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            pending: Vec::new(),
            total_tiles,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn fail(&mut self, tile: usize, stage: Stage, cause: impl Into<String>) {
        self.failed.push(TileFailure {
            tile,
            stage,
            cause: cause.into(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn failed_tiles(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.tile).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Process exit status: non-zero iff any tile failed.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// What an existing store holds, for `--status`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub technologies: Vec<String>,
    pub n_lat: usize,
    pub lat_chunk: usize,
    pub completed: Vec<CompletionMarker>,
    pub last_run: Option<RunSummary>,
}

impl StoreStatus {
    pub fn read(store: &CfStore) -> Result<Self, PipelineError> {
        let layout = store.layout();
        Ok(Self {
            technologies: layout.technologies.clone(),
            n_lat: layout.grid.n_lat,
            lat_chunk: store.lat_chunk(),
            completed: store.completed_markers()?,
            last_run: store.latest_run_summary()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        let mut summary = RunSummary::new(4);
        summary.written = vec![0, 1];
        summary.skipped = vec![2];
        assert_eq!(summary.exit_code(), 0);

        summary.fail(3, Stage::Prepare, "missing variable 'v100'");
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.failed_tiles(), vec![3]);
    }

    #[test]
    fn test_summary_json() {
        let mut summary = RunSummary::new(3);
        summary.written = vec![0];
        summary.fail(1, Stage::Evaluate, "unknown turbine");
        summary.pending = vec![2];
        summary.finish();

        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["written"], serde_json::json!([0]));
        assert_eq!(json["failed"][0]["tile"], 1);
        assert_eq!(json["failed"][0]["stage"], "evaluate");
        assert_eq!(json["pending"], serde_json::json!([2]));

        let back: RunSummary = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, summary);
    }
}
