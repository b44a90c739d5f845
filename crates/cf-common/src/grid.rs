//! Regular lat/lon grid specification.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};
use crate::BoundingBox;

/// A global rectilinear lat/lon grid.
///
/// Coordinates are cell centres. Row 0 is the first row in storage order;
/// `dlat` is negative for north-to-south grids such as ERA5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Number of latitude rows
    pub n_lat: usize,
    /// Number of longitude columns
    pub n_lon: usize,
    /// Latitude of row 0
    pub lat_first: f64,
    /// Longitude of column 0
    pub lon_first: f64,
    /// Signed latitude step between rows (degrees)
    pub dlat: f64,
    /// Signed longitude step between columns (degrees)
    pub dlon: f64,
}

impl Grid {
    /// Create a new grid specification.
    pub fn new(
        n_lat: usize,
        n_lon: usize,
        lat_first: f64,
        lon_first: f64,
        dlat: f64,
        dlon: f64,
    ) -> Self {
        Self {
            n_lat,
            n_lon,
            lat_first,
            lon_first,
            dlat,
            dlon,
        }
    }

    /// ERA5-style global grid: 90°N to 90°S inclusive, -180°E eastwards.
    pub fn global(resolution: f64) -> Self {
        let n_lat = (180.0 / resolution).round() as usize + 1;
        let n_lon = (360.0 / resolution).round() as usize;
        Self::new(n_lat, n_lon, 90.0, -180.0, -resolution, resolution)
    }

    /// Check that the grid is non-empty, finite and inside geographic bounds.
    pub fn validate(&self) -> CommonResult<()> {
        if self.n_lat == 0 || self.n_lon == 0 {
            return Err(CommonError::InvalidGrid(format!(
                "grid must have at least one row and column, got {}x{}",
                self.n_lat, self.n_lon
            )));
        }

        for (name, value) in [
            ("lat_first", self.lat_first),
            ("lon_first", self.lon_first),
            ("dlat", self.dlat),
            ("dlon", self.dlon),
        ] {
            if !value.is_finite() {
                return Err(CommonError::InvalidGrid(format!("{} is not finite", name)));
            }
        }

        if self.dlat == 0.0 || self.dlon == 0.0 {
            return Err(CommonError::InvalidGrid(
                "grid steps must be non-zero".to_string(),
            ));
        }

        let (min_lat, max_lat) = self.lat_extent();
        if min_lat < -90.0 - 1e-9 || max_lat > 90.0 + 1e-9 {
            return Err(CommonError::InvalidGrid(format!(
                "latitudes [{}, {}] exceed [-90, 90]",
                min_lat, max_lat
            )));
        }

        Ok(())
    }

    /// Latitude cell size in degrees.
    pub fn cell_size(&self) -> f64 {
        self.dlat.abs()
    }

    /// Latitude of a row centre.
    pub fn row_lat(&self, row: usize) -> f64 {
        self.lat_first + row as f64 * self.dlat
    }

    /// Longitude of a column centre.
    pub fn col_lon(&self, col: usize) -> f64 {
        self.lon_first + col as f64 * self.dlon
    }

    /// Latitudes of the given rows.
    pub fn lats(&self, rows: Range<usize>) -> Vec<f64> {
        rows.map(|row| self.row_lat(row)).collect()
    }

    /// Longitudes of all columns.
    pub fn lons(&self) -> Vec<f64> {
        (0..self.n_lon).map(|col| self.col_lon(col)).collect()
    }

    /// (min, max) latitude of cell centres.
    pub fn lat_extent(&self) -> (f64, f64) {
        let last = self.row_lat(self.n_lat.saturating_sub(1));
        (self.lat_first.min(last), self.lat_first.max(last))
    }

    /// (min, max) longitude of cell centres.
    pub fn lon_extent(&self) -> (f64, f64) {
        let last = self.col_lon(self.n_lon.saturating_sub(1));
        (self.lon_first.min(last), self.lon_first.max(last))
    }

    /// Bounding box of cell centres.
    pub fn bbox(&self) -> BoundingBox {
        self.band_bbox(0..self.n_lat)
    }

    /// Bounding box of cell centres for a latitude band.
    pub fn band_bbox(&self, rows: Range<usize>) -> BoundingBox {
        let (min_lon, max_lon) = self.lon_extent();
        let first = self.row_lat(rows.start);
        let last = self.row_lat(rows.end.saturating_sub(1).max(rows.start));
        BoundingBox::new(min_lon, first.min(last), max_lon, first.max(last))
    }

    /// Whether a row range lies within the grid.
    pub fn contains_rows(&self, rows: &Range<usize>) -> bool {
        rows.start <= rows.end && rows.end <= self.n_lat
    }

    /// Total number of grid cells.
    pub fn len(&self) -> usize {
        self.n_lat * self.n_lon
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.n_lat == 0 || self.n_lon == 0
    }
}
