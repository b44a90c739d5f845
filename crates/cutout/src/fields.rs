//! Weather fields for one latitude band, as consumed by the conversion models.

use std::ops::Range;

use chrono::{DateTime, Utc};

use crate::error::{CutoutError, Result};

/// Weather fields over a latitude band and a time window.
///
/// Time-varying fields are laid out `[time][row][col]` in row-major order,
/// `land_mask` is `[row][col]`. Missing values are `NaN`.
#[derive(Debug, Clone)]
pub struct WeatherFields {
    /// Grid rows covered (storage-order indices).
    pub rows: Range<usize>,
    /// Latitude of each row.
    pub lats: Vec<f64>,
    /// Longitude of each column.
    pub lons: Vec<f64>,
    /// Timestamp of each step (end of the accumulation hour).
    pub times: Vec<DateTime<Utc>>,
    /// Wind speed at `reference_height_m` (m/s).
    pub wind_speed: Vec<f32>,
    /// Global horizontal irradiance (W/m²).
    pub influx: Vec<f32>,
    /// 2 m air temperature (K).
    pub temperature: Vec<f32>,
    /// 1 land, 0 sea, NaN unknown.
    pub land_mask: Vec<f32>,
    /// Height of the wind speed field above ground (m).
    pub reference_height_m: f64,
}

impl WeatherFields {
    pub fn n_time(&self) -> usize {
        self.times.len()
    }

    pub fn n_rows(&self) -> usize {
        self.lats.len()
    }

    pub fn n_lon(&self) -> usize {
        self.lons.len()
    }

    /// Number of cells in one time step.
    pub fn cells(&self) -> usize {
        self.n_rows() * self.n_lon()
    }

    /// Flat index of a time-varying value.
    #[inline]
    pub fn index(&self, t: usize, row: usize, col: usize) -> usize {
        (t * self.n_rows() + row) * self.n_lon() + col
    }

    /// Flat index into `land_mask`.
    #[inline]
    pub fn cell_index(&self, row: usize, col: usize) -> usize {
        row * self.n_lon() + col
    }

    /// Whether a cell is land. Unknown cells are neither land nor sea.
    pub fn is_land(&self, row: usize, col: usize) -> Option<bool> {
        let value = self.land_mask[self.cell_index(row, col)];
        if value.is_nan() {
            None
        } else {
            Some(value >= 0.5)
        }
    }

    /// Check that every field has the size implied by the axes.
    pub fn validate(&self) -> Result<()> {
        if self.rows.len() != self.n_rows() {
            return Err(CutoutError::InvalidMetadata(format!(
                "{} latitudes for rows {:?}",
                self.n_rows(),
                self.rows
            )));
        }

        let expected = self.n_time() * self.cells();
        for (name, field) in [
            ("wind_speed", &self.wind_speed),
            ("influx", &self.influx),
            ("temperature", &self.temperature),
        ] {
            if field.len() != expected {
                return Err(CutoutError::ShapeMismatch {
                    variable: name.to_string(),
                    expected: vec![
                        self.n_time() as u64,
                        self.n_rows() as u64,
                        self.n_lon() as u64,
                    ],
                    actual: vec![field.len() as u64],
                });
            }
        }

        if self.land_mask.len() != self.cells() {
            return Err(CutoutError::ShapeMismatch {
                variable: "land_mask".to_string(),
                expected: vec![self.n_rows() as u64, self.n_lon() as u64],
                actual: vec![self.land_mask.len() as u64],
            });
        }

        Ok(())
    }
}
