//! Synthetic cutouts for tests.
//!
//! Fields are deterministic functions of (time, row, col) so that tests can
//! recompute expected values:
//! - wind: `u100 = 4 + (t + col) % 8`, `v100 = 3`
//! - irradiance: a day/night cycle following local solar time
//! - temperature: `t2m = 300 - |lat| / 2`
//! - land: the western half of the columns is land, the eastern half sea

use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Timelike, Utc};
use zarrs_filesystem::FilesystemStore;

use cf_common::{Grid, TimeAxis};

use crate::error::{CutoutError, Result};
use crate::features::Feature;
use crate::zarr::{CutoutMetadata, ZarrCutout};

/// Which arrays a synthetic cutout carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoutVariant {
    /// Raw reanalysis variables only; features must be prepared.
    Raw,
    /// Derived features only, with every row recorded as unprepared.
    Prepared,
}

/// Parameters for [`write_synthetic_cutout`].
#[derive(Debug, Clone)]
pub struct SyntheticCutout {
    pub grid: Grid,
    pub time: TimeAxis,
    pub variant: CutoutVariant,
    /// Rows per chunk of every array.
    pub chunk_rows: usize,
    /// Raw variables to leave out, to provoke preparation failures.
    pub omit: Vec<&'static str>,
}

impl SyntheticCutout {
    /// `n_lat x n_lon` grid of 5° cells starting at 37.5°N, 24 hours in June 2013.
    pub fn small(n_lat: usize, n_lon: usize) -> Self {
        let start = Utc
            .with_ymd_and_hms(2013, 6, 21, 1, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            grid: Grid::new(n_lat, n_lon, 37.5, 0.0, -5.0, 5.0),
            time: TimeAxis::hourly(start, 24),
            variant: CutoutVariant::Raw,
            chunk_rows: 4,
            omit: Vec::new(),
        }
    }

    pub fn variant(mut self, variant: CutoutVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn omit(mut self, variable: &'static str) -> Self {
        self.omit.push(variable);
        self
    }
}

/// Eastward 100 m wind (m/s).
pub fn u100(t: usize, _row: usize, col: usize) -> f32 {
    4.0 + ((t + col) % 8) as f32
}

/// Northward 100 m wind (m/s).
pub fn v100(_t: usize, _row: usize, _col: usize) -> f32 {
    3.0
}

/// Global horizontal irradiance (W/m²) for a UTC hour and longitude.
pub fn ghi(utc_hour: f32, lon: f64) -> f32 {
    let local = (utc_hour + lon as f32 / 15.0).rem_euclid(24.0);
    let elevation = (PI * (local - 6.0) / 12.0).sin();
    (900.0 * elevation).max(0.0)
}

/// 2 m temperature (K).
pub fn t2m(lat: f64) -> f32 {
    300.0 - (lat.abs() as f32) / 2.0
}

/// Land-sea fraction: western half land.
pub fn lsm(col: usize, n_lon: usize) -> f32 {
    if col < n_lon / 2 {
        1.0
    } else {
        0.0
    }
}

/// Generate a raw variable over the whole grid and time axis.
pub fn raw_variable(name: &str, grid: &Grid, time: &TimeAxis) -> Option<Vec<f32>> {
    let n_time = time.len;
    let cells = grid.n_lat * grid.n_lon;
    let mut data = Vec::with_capacity(n_time * cells);

    match name {
        "u100" | "v100" | "t2m" | "ssrd" => {
            for t in 0..n_time {
                // Accumulation ends at the timestamp; sample the middle of the hour.
                let timestamp = time.time_at(t);
                let hour = timestamp.hour() as f32 + timestamp.minute() as f32 / 60.0 - 0.5;
                for row in 0..grid.n_lat {
                    for col in 0..grid.n_lon {
                        data.push(match name {
                            "u100" => u100(t, row, col),
                            "v100" => v100(t, row, col),
                            "t2m" => t2m(grid.row_lat(row)),
                            _ => {
                                let value = ghi(hour, grid.col_lon(col)) * 3600.0;
                                // Reanalysis accumulations dip slightly negative at night.
                                if value == 0.0 {
                                    -0.5
                                } else {
                                    value
                                }
                            }
                        });
                    }
                }
            }
        }
        "lsm" => {
            for _row in 0..grid.n_lat {
                for col in 0..grid.n_lon {
                    data.push(lsm(col, grid.n_lon));
                }
            }
        }
        _ => return None,
    }

    Some(data)
}

/// Write a synthetic cutout into `path` and open it.
pub fn write_synthetic_cutout(path: &Path, synthetic: &SyntheticCutout) -> Result<ZarrCutout> {
    std::fs::create_dir_all(path)
        .map_err(|e| CutoutError::OpenFailed(format!("{}: {}", path.display(), e)))?;
    let store = FilesystemStore::new(path)
        .map_err(|e| CutoutError::OpenFailed(format!("{}: {}", path.display(), e)))?;

    let cutout = ZarrCutout::create(
        Arc::new(store),
        CutoutMetadata {
            grid: synthetic.grid,
            time: synthetic.time,
            wind_reference_height_m: 100.0,
            source: "synthetic".to_string(),
        },
    )?;

    for feature in Feature::ALL {
        let mut sources = Vec::new();
        for name in feature.sources() {
            let data = raw_variable(name, &synthetic.grid, &synthetic.time)
                .ok_or_else(|| CutoutError::InvalidMetadata(format!("unknown variable {}", name)))?;
            sources.push(data);
        }

        match synthetic.variant {
            CutoutVariant::Raw => {
                for (name, data) in feature.sources().iter().zip(&sources) {
                    if !synthetic.omit.contains(name) {
                        cutout.write_variable(name, feature.is_static(), synthetic.chunk_rows, data)?;
                    }
                }
            }
            CutoutVariant::Prepared => {
                let values = feature.derive(&sources);
                cutout.write_variable(
                    feature.array_name(),
                    feature.is_static(),
                    synthetic.chunk_rows,
                    &values,
                )?;
            }
        }
    }

    Ok(cutout)
}
