//! Writing tile cubes into the global store.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cf_store::{CfStore, StoreError};

use crate::error::WriteError;
use crate::evaluate::CfCube;
use crate::partition::Tile;

/// What [`write`] did with a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Written,
    /// The tile was already complete and overwrite was off; nothing was touched.
    Skipped,
}

/// Write `cube` into `tile`'s latitude band, then record the tile complete.
///
/// The completion marker is the last thing written, so a tile interrupted
/// mid-write is never reported complete.
pub fn write(
    store: &CfStore,
    tile: &Tile,
    cube: &CfCube,
    overwrite: bool,
) -> Result<WriteOutcome, WriteError> {
    if store.has_completion_marker(tile.index)? {
        if !overwrite {
            debug!(tile = tile.index, "Tile already complete, skipping write");
            return Ok(WriteOutcome::Skipped);
        }
        store.clear_completion_marker(tile.index)?;
    }

    check_cube(store, tile, cube)?;

    store
        .write_region(tile.rows.clone(), &cube.data, &cube.land_mask)
        .map_err(|e| match e {
            StoreError::Misaligned { rows, lat_chunk, .. } => WriteError::Misaligned {
                tile: tile.index,
                rows,
                lat_chunk,
            },
            StoreError::ShapeMismatch {
                what,
                expected,
                actual,
            } => WriteError::ShapeMismatch {
                tile: tile.index,
                what,
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            other => WriteError::Store(other),
        })?;

    let marker = store.mark_complete(tile.index, tile.rows.clone())?;
    info!(
        tile = tile.index,
        rows = ?marker.rows(),
        "Tile written"
    );
    Ok(WriteOutcome::Written)
}

fn check_cube(store: &CfStore, tile: &Tile, cube: &CfCube) -> Result<(), WriteError> {
    let layout = store.layout();

    if cube.rows != tile.rows {
        return Err(WriteError::ShapeMismatch {
            tile: tile.index,
            what: "cube rows",
            expected: format!("{:?}", tile.rows),
            actual: format!("{:?}", cube.rows),
        });
    }
    if cube.technologies != layout.technologies {
        return Err(WriteError::ShapeMismatch {
            tile: tile.index,
            what: "technologies",
            expected: format!("{:?}", layout.technologies),
            actual: format!("{:?}", cube.technologies),
        });
    }

    let expected = [
        layout.technologies.len(),
        layout.time.len,
        tile.rows.len(),
        layout.grid.n_lon,
    ];
    if cube.shape() != expected {
        return Err(WriteError::ShapeMismatch {
            tile: tile.index,
            what: "cube shape",
            expected: format!("{:?}", expected),
            actual: format!("{:?}", cube.shape()),
        });
    }
    Ok(())
}
