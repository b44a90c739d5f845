//! Shape and chunking of the capacity-factor store.

use serde::{Deserialize, Serialize};

use cf_common::{Grid, TimeAxis};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Effective chunk lengths, clamped to the axis lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunking {
    pub time: usize,
    pub lat: usize,
    pub lon: usize,
}

/// Everything that fixes the layout of a store.
///
/// Two runs can share a store only if their layouts agree on technologies
/// and their parameters, weather source, grid, time axis and chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreLayout {
    /// Technology labels, in the order of the leading array axis.
    pub technologies: Vec<String>,
    pub grid: Grid,
    pub time: TimeAxis,
    pub chunking: Chunking,
    /// Serialized conversion settings of every technology, in axis order.
    #[serde(default)]
    pub technology_params: serde_json::Value,
    /// Where the weather came from.
    #[serde(default)]
    pub source: String,
    /// Extra root attributes recorded at creation (not part of the layout identity).
    #[serde(skip)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl StoreLayout {
    pub fn new(
        technologies: Vec<String>,
        grid: Grid,
        time: TimeAxis,
        config: &StoreConfig,
    ) -> Self {
        let chunking = Chunking {
            time: config.time_chunk.clamp(1, time.len.max(1)),
            lat: config.lat_chunk.clamp(1, grid.n_lat.max(1)),
            lon: config.lon_chunk.clamp(1, grid.n_lon.max(1)),
        };
        Self {
            technologies,
            grid,
            time,
            chunking,
            technology_params: serde_json::Value::Null,
            source: String::new(),
            attributes: serde_json::Map::new(),
        }
    }

    /// Record what produced the values, so a resumed run cannot mix settings.
    pub fn with_provenance(mut self, technology_params: serde_json::Value, source: &str) -> Self {
        self.technology_params = technology_params;
        self.source = source.to_string();
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.technologies.is_empty() {
            return Err(StoreError::InvalidLayout(
                "at least one technology is required".to_string(),
            ));
        }
        for (i, name) in self.technologies.iter().enumerate() {
            if name.is_empty() {
                return Err(StoreError::InvalidLayout(
                    "technology names must not be empty".to_string(),
                ));
            }
            if self.technologies[..i].contains(name) {
                return Err(StoreError::InvalidLayout(format!(
                    "duplicate technology '{}'",
                    name
                )));
            }
        }
        self.grid
            .validate()
            .map_err(|e| StoreError::InvalidLayout(e.to_string()))?;
        self.time
            .validate()
            .map_err(|e| StoreError::InvalidLayout(e.to_string()))?;
        if self.chunking.time == 0 || self.chunking.lat == 0 || self.chunking.lon == 0 {
            return Err(StoreError::InvalidLayout(
                "chunk lengths must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `[technology, time, lat, lon]`
    pub fn shape(&self) -> Vec<u64> {
        vec![
            self.technologies.len() as u64,
            self.time.len as u64,
            self.grid.n_lat as u64,
            self.grid.n_lon as u64,
        ]
    }

    /// One technology per chunk.
    pub fn chunk_shape(&self) -> Vec<u64> {
        vec![
            1,
            self.chunking.time as u64,
            self.chunking.lat as u64,
            self.chunking.lon as u64,
        ]
    }

    /// Number of values in a region spanning `rows` latitude rows.
    pub fn region_len(&self, rows: usize) -> usize {
        self.technologies.len() * self.time.len * rows * self.grid.n_lon
    }

    /// Whether a row range starts on a chunk boundary and ends on one or on the last row.
    pub fn is_aligned(&self, start: usize, end: usize) -> bool {
        let chunk = self.chunking.lat;
        start < end
            && end <= self.grid.n_lat
            && start % chunk == 0
            && (end % chunk == 0 || end == self.grid.n_lat)
    }

    /// Compare with an existing layout, reporting the first difference.
    pub fn check_compatible(&self, existing: &StoreLayout) -> Result<()> {
        if existing.technologies != self.technologies {
            return Err(StoreError::LayoutMismatch {
                field: "technologies",
                existing: format!("{:?}", existing.technologies),
                requested: format!("{:?}", self.technologies),
            });
        }
        if existing.technology_params != self.technology_params {
            return Err(StoreError::LayoutMismatch {
                field: "technology parameters",
                existing: existing.technology_params.to_string(),
                requested: self.technology_params.to_string(),
            });
        }
        if existing.source != self.source {
            return Err(StoreError::LayoutMismatch {
                field: "cutout source",
                existing: existing.source.clone(),
                requested: self.source.clone(),
            });
        }
        if !grids_match(&existing.grid, &self.grid) {
            return Err(StoreError::LayoutMismatch {
                field: "grid",
                existing: format!("{:?}", existing.grid),
                requested: format!("{:?}", self.grid),
            });
        }
        if existing.time != self.time {
            return Err(StoreError::LayoutMismatch {
                field: "time axis",
                existing: format!("{:?}", existing.time),
                requested: format!("{:?}", self.time),
            });
        }
        if existing.chunking != self.chunking {
            return Err(StoreError::LayoutMismatch {
                field: "chunking",
                existing: format!("{:?}", existing.chunking),
                requested: format!("{:?}", self.chunking),
            });
        }
        Ok(())
    }
}

fn grids_match(a: &Grid, b: &Grid) -> bool {
    const EPS: f64 = 1e-9;
    a.n_lat == b.n_lat
        && a.n_lon == b.n_lon
        && (a.lat_first - b.lat_first).abs() < EPS
        && (a.lon_first - b.lon_first).abs() < EPS
        && (a.dlat - b.dlat).abs() < EPS
        && (a.dlon - b.dlon).abs() < EPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_layout(lat_chunk: usize) -> StoreLayout {
        let config = StoreConfig {
            lat_chunk,
            ..Default::default()
        };
        StoreLayout::new(
            vec!["wind_onshore".to_string(), "solar".to_string()],
            Grid::new(16, 8, 37.5, 0.0, -5.0, 5.0),
            TimeAxis::hourly(Utc.with_ymd_and_hms(2013, 1, 1, 1, 0, 0).unwrap(), 48),
            &config,
        )
    }

    #[test]
    fn test_shape_and_clamped_chunks() {
        let layout = test_layout(4);
        assert_eq!(layout.shape(), vec![2, 48, 16, 8]);
        // time and lon chunks are clamped to the axis length
        assert_eq!(layout.chunk_shape(), vec![1, 48, 4, 8]);
        assert_eq!(layout.region_len(4), 2 * 48 * 4 * 8);

        let wide = test_layout(180);
        assert_eq!(wide.chunking.lat, 16);
    }

    #[test]
    fn test_alignment() {
        let layout = test_layout(5);
        assert!(layout.is_aligned(0, 5));
        assert!(layout.is_aligned(5, 15));
        assert!(layout.is_aligned(15, 16));
        assert!(!layout.is_aligned(2, 5));
        assert!(!layout.is_aligned(5, 12));
        assert!(!layout.is_aligned(5, 5));
        assert!(!layout.is_aligned(15, 17));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut layout = test_layout(4);
        assert!(layout.validate().is_ok());
        layout.technologies.push("solar".to_string());
        assert!(matches!(
            layout.validate(),
            Err(StoreError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_check_compatible() {
        let a = test_layout(4);
        assert!(a.check_compatible(&test_layout(4)).is_ok());

        let err = a.check_compatible(&test_layout(8)).unwrap_err();
        assert!(matches!(err, StoreError::LayoutMismatch { field: "chunking", .. }));

        let turbine = |name: &str| serde_json::json!([{ "name": "wind_onshore", "turbine": name }]);
        let vestas = test_layout(4).with_provenance(turbine("Vestas_V112_3MW"), "era5");
        assert!(vestas
            .check_compatible(&test_layout(4).with_provenance(turbine("Vestas_V112_3MW"), "era5"))
            .is_ok());
        let err = vestas
            .check_compatible(&test_layout(4).with_provenance(turbine("Enercon_E82_3000kW"), "era5"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::LayoutMismatch {
                field: "technology parameters",
                ..
            }
        ));
        let err = vestas
            .check_compatible(&test_layout(4).with_provenance(turbine("Vestas_V112_3MW"), "merra2"))
            .unwrap_err();
        assert!(matches!(err, StoreError::LayoutMismatch { field: "cutout source", .. }));

        let mut other = test_layout(4);
        other.technologies.reverse();
        let err = a.check_compatible(&other).unwrap_err();
        assert!(matches!(
            err,
            StoreError::LayoutMismatch {
                field: "technologies",
                ..
            }
        ));
    }
}
