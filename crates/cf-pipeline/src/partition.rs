//! Cutting the latitude axis into tiles.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::{TileSelection, TilingConfig};
use crate::error::ConfigurationError;

/// Tolerance for a degree step to count as a whole number of rows.
pub const DEGREE_STEP_TOLERANCE: f64 = 1e-6;

/// A contiguous latitude band of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub index: usize,
    pub rows: Range<usize>,
}

impl Tile {
    pub fn new(index: usize, rows: Range<usize>) -> Self {
        Self { index, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Partition `total_rows` latitude rows into tiles aligned to `chunk_rows`.
///
/// Tiles are ordered, disjoint and cover `0..total_rows`. Every tile starts
/// on a chunk boundary; every tile but the last ends on one, and the last
/// ends on the final row.
pub fn partition(
    total_rows: usize,
    chunk_rows: usize,
    cell_size: f64,
    tiling: &TilingConfig,
) -> Result<Vec<Tile>, ConfigurationError> {
    if chunk_rows == 0 {
        return Err(ConfigurationError::ZeroChunkSize);
    }
    if tiling.tile_count == Some(0) {
        return Err(ConfigurationError::ZeroTileCount);
    }
    if tiling.rows_per_tile == Some(0) {
        return Err(ConfigurationError::ZeroRowsPerTile);
    }

    let step_rows = match tiling.degree_step {
        Some(step) => Some(rows_for_step(step, cell_size, chunk_rows)?),
        None => None,
    };

    let rows_per_tile = match (tiling.rows_per_tile, step_rows) {
        (Some(rows), Some(step_rows)) if rows != step_rows => {
            return Err(ConfigurationError::ContradictoryTiling {
                rows_per_tile: rows,
                step_rows,
            });
        }
        (Some(rows), _) => Some(rows),
        (None, step_rows) => step_rows,
    };

    if let Some(rows) = rows_per_tile {
        if rows % chunk_rows != 0 {
            return Err(ConfigurationError::MisalignedTiles {
                rows_per_tile: rows,
                chunk_rows,
            });
        }
    }

    if total_rows == 0 {
        return Ok(Vec::new());
    }

    match rows_per_tile {
        Some(rows) => Ok(fixed_height(total_rows, rows)),
        None => even_split(total_rows, chunk_rows, tiling.tile_count.unwrap_or(1)),
    }
}

/// Rows per tile for a degree step, rejecting steps that are not a whole
/// number of cells.
fn rows_for_step(step: f64, cell_size: f64, chunk_rows: usize) -> Result<usize, ConfigurationError> {
    if !(step.is_finite() && step > 0.0) {
        return Err(ConfigurationError::InvalidDegreeStep(step));
    }
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(ConfigurationError::InvalidCellSize(cell_size));
    }

    let rows = step / cell_size;
    let nearest = rows.round();
    if (rows - nearest).abs() > DEGREE_STEP_TOLERANCE || nearest < 1.0 {
        // Valid steps are whole multiples of one latitude chunk.
        let chunk = chunk_rows as f64;
        let lower = (rows / chunk).floor().max(1.0) * chunk * cell_size;
        let upper = (rows / chunk).ceil().max(1.0) * chunk * cell_size;
        return Err(ConfigurationError::FractionalDegreeStep {
            step,
            cell_size,
            rows,
            lower,
            upper,
        });
    }
    Ok(nearest as usize)
}

fn fixed_height(total_rows: usize, rows: usize) -> Vec<Tile> {
    (0..total_rows)
        .step_by(rows)
        .enumerate()
        .map(|(index, start)| Tile::new(index, start..(start + rows).min(total_rows)))
        .collect()
}

fn even_split(
    total_rows: usize,
    chunk_rows: usize,
    tile_count: usize,
) -> Result<Vec<Tile>, ConfigurationError> {
    let chunks = total_rows.div_ceil(chunk_rows);
    if tile_count > chunks {
        return Err(ConfigurationError::TooManyTiles { tile_count, chunks });
    }

    let rows = (chunks / tile_count) * chunk_rows;
    Ok((0..tile_count)
        .map(|index| {
            let start = index * rows;
            let end = if index + 1 == tile_count {
                total_rows
            } else {
                start + rows
            };
            Tile::new(index, start..end)
        })
        .collect())
}

/// Restrict a partition to the configured window.
pub fn select(tiles: &[Tile], selection: &TileSelection) -> Result<Vec<Tile>, ConfigurationError> {
    if tiles.is_empty() {
        return Ok(Vec::new());
    }
    if selection.start_index >= tiles.len() {
        return Err(ConfigurationError::StartIndexOutOfRange {
            start_index: selection.start_index,
            tiles: tiles.len(),
        });
    }
    let end = match selection.limit {
        Some(limit) => selection.start_index.saturating_add(limit).min(tiles.len()),
        None => tiles.len(),
    };
    Ok(tiles[selection.start_index..end].to_vec())
}
