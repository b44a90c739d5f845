//! Cutout preparation strategies.
//!
//! The driver calls [`PrepareStrategy::before_run`] once and
//! [`PrepareStrategy::before_tile`] for every tile it evaluates; which of the
//! two does any work depends on the [`PrepareMode`].

use std::ops::Range;

use tracing::{debug, info};

use cutout::CutoutProvider;

use crate::config::PrepareMode;
use crate::error::{PrepareError, PrepareScope};
use crate::partition::Tile;

/// When and how much of the cutout to prepare.
pub trait PrepareStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once before the first tile that needs evaluation.
    fn before_run(&self, _cutout: &dyn CutoutProvider) -> Result<(), PrepareError> {
        Ok(())
    }

    /// Called right before a tile is evaluated.
    fn before_tile(&self, _cutout: &dyn CutoutProvider, _tile: &Tile) -> Result<(), PrepareError> {
        Ok(())
    }
}

/// Trust that the cutout is prepared.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipPreparation;

impl PrepareStrategy for SkipPreparation {
    fn name(&self) -> &'static str {
        "skip"
    }
}

/// Prepare every row of the cutout before the first tile.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeCutoutPreparation;

impl PrepareStrategy for WholeCutoutPreparation {
    fn name(&self) -> &'static str {
        "whole"
    }

    fn before_run(&self, cutout: &dyn CutoutProvider) -> Result<(), PrepareError> {
        let rows = 0..cutout.grid().n_lat;
        ensure_prepared(cutout, rows, PrepareScope::WholeCutout)
    }
}

/// Prepare each tile's latitude band just before it is evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerTilePreparation;

impl PrepareStrategy for PerTilePreparation {
    fn name(&self) -> &'static str {
        "per_tile"
    }

    fn before_tile(&self, cutout: &dyn CutoutProvider, tile: &Tile) -> Result<(), PrepareError> {
        ensure_prepared(cutout, tile.rows.clone(), PrepareScope::Tile(tile.index))
    }
}

impl PrepareMode {
    pub fn strategy(&self) -> Box<dyn PrepareStrategy> {
        match self {
            PrepareMode::Skip => Box::new(SkipPreparation),
            PrepareMode::Whole => Box::new(WholeCutoutPreparation),
            PrepareMode::PerTile => Box::new(PerTilePreparation),
        }
    }
}

fn ensure_prepared(
    cutout: &dyn CutoutProvider,
    rows: Range<usize>,
    scope: PrepareScope,
) -> Result<(), PrepareError> {
    let prepared = cutout
        .is_prepared(rows.clone())
        .map_err(|e| PrepareError::new(scope, e))?;
    if prepared {
        debug!(scope = %scope, rows = ?rows, "Cutout already prepared");
        return Ok(());
    }

    let report = cutout
        .prepare_region(rows.clone())
        .map_err(|e| PrepareError::new(scope, e))?;
    info!(
        scope = %scope,
        rows = ?rows,
        derived = ?report.derived,
        validated = ?report.validated,
        "Prepared cutout features"
    );
    Ok(())
}

/// Make sure the cutout is prepared for `tile` under `mode`.
///
/// Idempotent: already-prepared rows are detected and left alone.
pub fn prepare<C: CutoutProvider + ?Sized>(
    cutout: &C,
    tile: &Tile,
    mode: PrepareMode,
) -> Result<(), PrepareError> {
    let strategy = mode.strategy();
    // `&C` is sized even when `C` is not, and implements the trait.
    let cutout: &dyn CutoutProvider = &cutout;
    strategy.before_run(cutout)?;
    strategy.before_tile(cutout, tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutout::testdata::{write_synthetic_cutout, SyntheticCutout};
    use cutout::CutoutError;

    #[test]
    fn test_whole_mode_prepares_every_row_once() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let cutout = write_synthetic_cutout(temp_dir.path(), &SyntheticCutout::small(8, 4))
            .expect("write cutout");

        prepare(&cutout, &Tile::new(1, 4..8), PrepareMode::Whole).expect("prepare");
        assert!(cutout.is_prepared(0..8).unwrap());

        // second call is a no-op
        prepare(&cutout, &Tile::new(0, 0..4), PrepareMode::Whole).expect("prepare again");
        assert_eq!(cutout.prepared_ranges().unwrap().row_count(), 8);
    }

    #[test]
    fn test_per_tile_mode_prepares_only_the_band() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let cutout = write_synthetic_cutout(temp_dir.path(), &SyntheticCutout::small(8, 4))
            .expect("write cutout");

        prepare(&cutout, &Tile::new(1, 4..8), PrepareMode::PerTile).expect("prepare");
        assert!(cutout.is_prepared(4..8).unwrap());
        assert!(!cutout.is_prepared(0..4).unwrap());
    }

    #[test]
    fn test_skip_mode_does_nothing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let cutout = write_synthetic_cutout(temp_dir.path(), &SyntheticCutout::small(8, 4))
            .expect("write cutout");

        prepare(&cutout, &Tile::new(0, 0..4), PrepareMode::Skip).expect("skip");
        assert!(!cutout.is_prepared(0..4).unwrap());
        assert_eq!(PrepareMode::Skip.strategy().name(), "skip");
    }

    #[test]
    fn test_failure_names_the_tile() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let cutout = write_synthetic_cutout(
            temp_dir.path(),
            &SyntheticCutout::small(8, 4).omit("t2m"),
        )
        .expect("write cutout");

        let err = prepare(&cutout, &Tile::new(1, 4..8), PrepareMode::PerTile).unwrap_err();
        assert_eq!(err.scope, PrepareScope::Tile(1));
        assert!(matches!(err.source, CutoutError::MissingVariable { .. }));

        let err = prepare(&cutout, &Tile::new(1, 4..8), PrepareMode::Whole).unwrap_err();
        assert_eq!(err.scope, PrepareScope::WholeCutout);
    }
}
