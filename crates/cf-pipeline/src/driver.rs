//! The pipeline driver.
//!
//! ```text
//! INIT -> PARTITIONED -> (PREPARING -> EVALUATING -> WRITING -> DONE)* -> FINALIZED
//! ```
//!
//! Tiles are processed one at a time in ascending order. A tile that fails
//! is recorded and the run moves on, unless fail-fast is set. Only
//! configuration problems and store corruption end a run early.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use zarrs::storage::ReadableWritableListableStorage;
use zarrs_filesystem::FilesystemStore;

use cf_store::{CfStore, StoreError, StoreLayout};
use cutout::{CutoutProvider, ZarrCutout};

use crate::config::RunConfig;
use crate::error::{
    ConfigurationError, EvaluationError, PipelineError, PrepareError, Stage, WriteError,
};
use crate::evaluate::CfEvaluator;
use crate::partition::{partition, select, Tile};
use crate::prepare::PrepareStrategy;
use crate::summary::RunSummary;
use crate::writer::{self, WriteOutcome};

const GENERATION_NOTE: &str = "Hourly capacity factors at unit (1 kW) capacity per grid cell. \
     NaN marks cells outside a technology's eligibility mask or with missing weather.";

/// States of a run, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Partitioned,
    Preparing,
    Evaluating,
    Writing,
    Done,
    Finalized,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "INIT",
            RunState::Partitioned => "PARTITIONED",
            RunState::Preparing => "PREPARING",
            RunState::Evaluating => "EVALUATING",
            RunState::Writing => "WRITING",
            RunState::Done => "DONE",
            RunState::Finalized => "FINALIZED",
        };
        f.write_str(name)
    }
}

fn transition(state: &mut RunState, next: RunState, tile: Option<usize>) {
    debug!(from = %state, to = %next, tile = ?tile, "Pipeline state transition");
    *state = next;
}

/// Why a single tile did not complete.
enum TileError {
    Prepare(PrepareError),
    Evaluate(EvaluationError),
    Write(WriteError),
}

impl TileError {
    fn stage(&self) -> Stage {
        match self {
            TileError::Prepare(_) => Stage::Prepare,
            TileError::Evaluate(_) => Stage::Evaluate,
            TileError::Write(_) => Stage::Write,
        }
    }
}

impl fmt::Display for TileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileError::Prepare(e) => write!(f, "{}", e),
            TileError::Evaluate(e) => write!(f, "{}", e),
            TileError::Write(e) => write!(f, "{}", e),
        }
    }
}

/// A configured run over one cutout and one output store.
pub struct Pipeline<C: CutoutProvider> {
    config: RunConfig,
    cutout: C,
    storage: ReadableWritableListableStorage,
}

impl Pipeline<ZarrCutout> {
    /// Open the cutout and the output directory named in `config`.
    ///
    /// Configuration and tiling are checked first, so a rejected run leaves
    /// no output directory behind.
    pub fn from_config(config: RunConfig) -> Result<Self, PipelineError> {
        let cutout = ZarrCutout::open(&config.cutout).map_err(ConfigurationError::Cutout)?;
        config.validate()?;
        plan(&config, &cutout)?;
        let storage = open_output(&config)?;
        Ok(Self::new(config, cutout, storage))
    }
}

/// Filesystem storage for `config.output`, creating the directory if needed.
pub fn open_output(config: &RunConfig) -> Result<ReadableWritableListableStorage, PipelineError> {
    let path = &config.output;
    if path.as_os_str().is_empty() {
        return Err(ConfigurationError::invalid("output path is required").into());
    }
    if path.exists() && !path.is_dir() {
        return Err(ConfigurationError::invalid(format!(
            "output path {} exists and is not a directory",
            path.display()
        ))
        .into());
    }
    std::fs::create_dir_all(path).map_err(|e| {
        PipelineError::Store(StoreError::storage_error(format!(
            "failed to create {}: {}",
            path.display(),
            e
        )))
    })?;
    let store = FilesystemStore::new(path).map_err(|e| {
        PipelineError::Store(StoreError::storage_error(format!(
            "failed to open {}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(Arc::new(store))
}

impl<C: CutoutProvider> Pipeline<C> {
    pub fn new(config: RunConfig, cutout: C, storage: ReadableWritableListableStorage) -> Self {
        Self {
            config,
            cutout,
            storage,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every selected tile and summarize.
    ///
    /// Returns `Ok` whenever the run reached the end, even if tiles failed;
    /// check [`RunSummary::exit_code`].
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut state = RunState::Init;
        debug!(state = %state, "Starting pipeline");

        self.config.validate()?;
        let evaluator = CfEvaluator::new(self.config.technologies.clone(), self.config.threads)
            .map_err(|e| ConfigurationError::invalid(e.to_string()))?;

        // Tiling problems surface before the store is created or opened.
        let RunPlan {
            layout,
            tiles,
            selected,
        } = plan(&self.config, &self.cutout)?;

        let store = CfStore::create_or_open(
            Arc::clone(&self.storage),
            layout,
            &self.config.store,
            self.config.overwrite,
        )?;
        check_tiling(&store, &tiles)?;
        transition(&mut state, RunState::Partitioned, None);
        info!(
            tiles = tiles.len(),
            selected = selected.len(),
            first = ?selected.first().map(|t| t.index),
            lat_chunk = store.lat_chunk(),
            prepare = ?self.config.prepare,
            "Partitioned latitude axis"
        );

        let mut summary = RunSummary::new(tiles.len());
        let strategy = self.config.prepare.strategy();
        let cutout: &dyn CutoutProvider = &self.cutout;
        let mut whole_prepare: Option<Result<(), String>> = None;

        for (position, tile) in selected.iter().enumerate() {
            if !self.config.overwrite && store.has_completion_marker(tile.index)? {
                debug!(tile = tile.index, "Tile already complete");
                summary.skipped.push(tile.index);
                continue;
            }

            let prepared = whole_prepare.get_or_insert_with(|| {
                strategy.before_run(cutout).map_err(|e| {
                    error!(strategy = strategy.name(), error = %e, "Cutout preparation failed");
                    e.to_string()
                })
            });
            if let Err(cause) = prepared {
                summary.fail(tile.index, Stage::Prepare, cause.clone());
                continue;
            }

            match self.process_tile(&store, &evaluator, strategy.as_ref(), tile, &mut state) {
                Ok(WriteOutcome::Written) => summary.written.push(tile.index),
                Ok(WriteOutcome::Skipped) => summary.skipped.push(tile.index),
                Err(TileError::Write(e)) if e.is_store_corruption() => {
                    error!(tile = tile.index, error = %e, "Store corruption, aborting run");
                    summary.fail(tile.index, Stage::Write, e.to_string());
                    summary
                        .pending
                        .extend(selected[position + 1..].iter().map(|t| t.index));
                    self.finalize(&store, &mut summary, &mut state);
                    return Err(PipelineError::Aborted {
                        tile: tile.index,
                        summary: Box::new(summary),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(tile = tile.index, stage = %e.stage(), error = %e, "Tile failed");
                    summary.fail(tile.index, e.stage(), e.to_string());
                    if self.config.fail_fast {
                        let rest: Vec<usize> =
                            selected[position + 1..].iter().map(|t| t.index).collect();
                        warn!(pending = ?rest, "Fail-fast set, stopping");
                        summary.pending = rest;
                        break;
                    }
                }
            }
        }

        self.finalize(&store, &mut summary, &mut state);
        Ok(summary)
    }

    fn process_tile(
        &self,
        store: &CfStore,
        evaluator: &CfEvaluator,
        strategy: &dyn PrepareStrategy,
        tile: &Tile,
        state: &mut RunState,
    ) -> Result<WriteOutcome, TileError> {
        transition(state, RunState::Preparing, Some(tile.index));
        let bounds = self.cutout.grid().band_bbox(tile.rows.clone());
        info!(
            tile = tile.index,
            rows = ?tile.rows,
            lat_min = bounds.min_lat,
            lat_max = bounds.max_lat,
            "Processing tile"
        );
        strategy
            .before_tile(&self.cutout, tile)
            .map_err(TileError::Prepare)?;

        transition(state, RunState::Evaluating, Some(tile.index));
        let cube = evaluator
            .evaluate(&self.cutout, tile)
            .map_err(TileError::Evaluate)?;

        transition(state, RunState::Writing, Some(tile.index));
        let outcome =
            writer::write(store, tile, &cube, self.config.overwrite).map_err(TileError::Write)?;

        transition(state, RunState::Done, Some(tile.index));
        Ok(outcome)
    }

    fn finalize(&self, store: &CfStore, summary: &mut RunSummary, state: &mut RunState) {
        summary.finish();
        if let Err(e) = store.record_run_summary(summary) {
            warn!(error = %e, "Failed to record run summary in store");
        }
        transition(state, RunState::Finalized, None);
        info!(
            written = ?summary.written,
            skipped = ?summary.skipped,
            failed = ?summary.failed_tiles(),
            pending = ?summary.pending,
            "Run finished"
        );
    }
}

/// Layout and partition of a run, computed without touching the output.
struct RunPlan {
    layout: StoreLayout,
    tiles: Vec<Tile>,
    selected: Vec<Tile>,
}

fn plan<C: CutoutProvider + ?Sized>(
    config: &RunConfig,
    cutout: &C,
) -> Result<RunPlan, ConfigurationError> {
    let layout = store_layout(config, cutout)?;
    let grid = cutout.grid();
    let tiles = partition(
        grid.n_lat,
        layout.chunking.lat,
        grid.cell_size(),
        &config.tiling,
    )?;
    let selected = select(&tiles, &config.selection)?;
    Ok(RunPlan {
        layout,
        tiles,
        selected,
    })
}

/// Store layout for the run's technologies over the cutout grid.
fn store_layout<C: CutoutProvider + ?Sized>(
    config: &RunConfig,
    cutout: &C,
) -> Result<StoreLayout, ConfigurationError> {
    let params = serde_json::to_value(&config.technologies)
        .map_err(|e| ConfigurationError::invalid(e.to_string()))?;

    let mut attributes = serde_json::Map::new();
    attributes.insert(
        "generation_note".to_string(),
        serde_json::Value::from(GENERATION_NOTE),
    );
    attributes.insert(
        "bounds".to_string(),
        serde_json::json!(cutout.grid().bbox().to_array()),
    );

    Ok(StoreLayout::new(
        config.technology_names(),
        *cutout.grid(),
        *cutout.time_axis(),
        &config.store,
    )
    .with_provenance(params, cutout.source())
    .with_attributes(attributes))
}

/// Completion markers must match the current partition.
fn check_tiling(store: &CfStore, tiles: &[Tile]) -> Result<(), PipelineError> {
    for marker in store.completed_markers()? {
        let partition_rows = tiles.get(marker.tile).map(|t| t.rows.clone());
        if partition_rows.as_ref() != Some(&marker.rows()) {
            return Err(ConfigurationError::TilingChanged {
                tile: marker.tile,
                marker_rows: marker.rows(),
                partition_rows,
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(RunState::Init.to_string(), "INIT");
        assert_eq!(RunState::Finalized.to_string(), "FINALIZED");

        let mut state = RunState::Init;
        transition(&mut state, RunState::Partitioned, None);
        assert_eq!(state, RunState::Partitioned);
    }

    #[test]
    fn test_open_output_rejects_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("cf.zarr");
        std::fs::write(&file, b"not a directory").expect("write");

        let config = RunConfig {
            output: file,
            ..Default::default()
        };
        assert!(matches!(
            open_output(&config),
            Err(PipelineError::Configuration(ConfigurationError::Invalid(_)))
        ));

        let config = RunConfig {
            output: temp_dir.path().join("nested/cf.zarr"),
            ..Default::default()
        };
        assert!(open_output(&config).is_ok());
        assert!(temp_dir.path().join("nested/cf.zarr").is_dir());
    }
}
