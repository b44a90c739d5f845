//! Error taxonomy of the pipeline.
//!
//! Configuration errors and store corruption end the run. Preparation,
//! evaluation and ordinary write errors are scoped to one tile and recorded
//! in the run summary.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cf_store::StoreError;
use cutout::CutoutError;

use crate::summary::RunSummary;

/// Invalid settings or an output location that cannot be used. Fatal.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("store chunk size along latitude must be > 0")]
    ZeroChunkSize,

    #[error("tile count must be > 0")]
    ZeroTileCount,

    #[error("rows per tile must be > 0")]
    ZeroRowsPerTile,

    #[error("degree step must be a positive finite number, got {0}")]
    InvalidDegreeStep(f64),

    #[error("grid cell size must be a positive finite number, got {0}")]
    InvalidCellSize(f64),

    #[error(
        "degree step {step} is not a whole number of {cell_size}° cells ({rows:.4} rows); nearest valid steps are {lower} and {upper}"
    )]
    FractionalDegreeStep {
        step: f64,
        cell_size: f64,
        rows: f64,
        lower: f64,
        upper: f64,
    },

    #[error("rows per tile {rows_per_tile} contradicts degree step ({step_rows} rows)")]
    ContradictoryTiling {
        rows_per_tile: usize,
        step_rows: usize,
    },

    #[error("rows per tile {rows_per_tile} is not a multiple of the latitude chunk size {chunk_rows}")]
    MisalignedTiles {
        rows_per_tile: usize,
        chunk_rows: usize,
    },

    #[error("{tile_count} tiles requested but the grid has only {chunks} latitude chunks")]
    TooManyTiles { tile_count: usize, chunks: usize },

    #[error("tile start index {start_index} out of range (0..{tiles})")]
    StartIndexOutOfRange { start_index: usize, tiles: usize },

    #[error(
        "store was built with a different tiling: tile {tile} is marked complete for rows {marker_rows:?}, current partition gives {partition_rows:?}"
    )]
    TilingChanged {
        tile: usize,
        marker_rows: Range<usize>,
        partition_rows: Option<Range<usize>>,
    },

    #[error("output store cannot be reused: {0}")]
    IncompatibleStore(#[source] StoreError),

    #[error("cutout cannot be opened: {0}")]
    Cutout(#[source] CutoutError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// What a preparation covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareScope {
    WholeCutout,
    Tile(usize),
}

impl fmt::Display for PrepareScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepareScope::WholeCutout => write!(f, "whole cutout"),
            PrepareScope::Tile(index) => write!(f, "tile {}", index),
        }
    }
}

/// Cutout preparation failed.
#[derive(Error, Debug)]
#[error("preparation failed for {scope}: {source}")]
pub struct PrepareError {
    pub scope: PrepareScope,
    #[source]
    pub source: CutoutError,
}

impl PrepareError {
    pub fn new(scope: PrepareScope, source: CutoutError) -> Self {
        Self { scope, source }
    }
}

/// Capacity factors could not be computed for a tile.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("unsupported technology '{technology}': {reason}")]
    UnsupportedTechnology { technology: String, reason: String },

    #[error("failed to load weather for rows {rows:?}: {source}")]
    Load {
        rows: Range<usize>,
        #[source]
        source: CutoutError,
    },

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl EvaluationError {
    pub fn unsupported(technology: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedTechnology {
            technology: technology.into(),
            reason: reason.into(),
        }
    }
}

/// A tile's cube could not be written.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("tile {tile} rows {rows:?} do not match latitude chunks of {lat_chunk}")]
    Misaligned {
        tile: usize,
        rows: Range<usize>,
        lat_chunk: usize,
    },

    #[error("tile {tile}: {what} is {actual}, store expects {expected}")]
    ShapeMismatch {
        tile: usize,
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WriteError {
    /// Whether the store itself is damaged; such errors end the run.
    pub fn is_store_corruption(&self) -> bool {
        matches!(self, WriteError::Store(e) if e.is_corruption())
    }
}

/// Stage of the per-tile state machine in which a tile failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    Evaluate,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::Evaluate => "evaluate",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Fatal conditions returned by [`crate::Pipeline::run`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The store was found corrupt mid-run. The summary covers the tiles
    /// processed before the failure; the rest are pending.
    #[error("run aborted at tile {tile}: {source}")]
    Aborted {
        tile: usize,
        summary: Box<RunSummary>,
        #[source]
        source: WriteError,
    },
}

impl PipelineError {
    /// Partial summary, if the run got far enough to have one.
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            PipelineError::Aborted { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        if err.is_incompatible_store() {
            PipelineError::Configuration(ConfigurationError::IncompatibleStore(err))
        } else {
            PipelineError::Store(err)
        }
    }
}
