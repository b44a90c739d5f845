//! Cutout stored as a Zarr V3 group.
//!
//! Layout:
//! - root group attributes: `grid`, `time`, `wind_reference_height_m`, `source`
//! - raw variables `u100`, `v100`, `ssrd`, `t2m` as `[time, lat, lon]` and
//!   `lsm` as `[lat, lon]`
//! - derived features (see [`Feature`]) with the same shapes
//! - `_prepared.json`, the rows whose features are materialized

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs::storage::{ReadableWritableListableStorage, ReadableWritableListableStorageTraits};
use zarrs_filesystem::FilesystemStore;

use cf_common::{sidecar, Grid, TimeAxis};

use crate::error::{CutoutError, Result};
use crate::features::Feature;
use crate::fields::WeatherFields;
use crate::ledger::{PreparedRanges, PREPARED_KEY};
use crate::provider::{CutoutProvider, PrepareReport};

type CutoutArray = Array<dyn ReadableWritableListableStorageTraits>;

fn default_reference_height() -> f64 {
    100.0
}

/// Attributes of the cutout root group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutMetadata {
    pub grid: Grid,
    pub time: TimeAxis,
    /// Height of the wind speed feature above ground (m).
    #[serde(default = "default_reference_height")]
    pub wind_reference_height_m: f64,
    /// Data source, e.g. `era5`.
    #[serde(default)]
    pub source: String,
}

/// A weather cutout backed by a Zarr store.
pub struct ZarrCutout {
    storage: ReadableWritableListableStorage,
    metadata: CutoutMetadata,
}

impl ZarrCutout {
    /// Open a cutout directory.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(CutoutError::OpenFailed(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        let store = FilesystemStore::new(path)
            .map_err(|e| CutoutError::OpenFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_storage(Arc::new(store))
    }

    /// Open a cutout from any readable/writable store.
    pub fn from_storage(storage: ReadableWritableListableStorage) -> Result<Self> {
        let group = Group::open(Arc::clone(&storage), "/")
            .map_err(|e| CutoutError::OpenFailed(e.to_string()))?;

        let metadata: CutoutMetadata =
            serde_json::from_value(serde_json::Value::Object(group.attributes().clone()))
                .map_err(|e| CutoutError::InvalidMetadata(e.to_string()))?;
        metadata.grid.validate()?;
        metadata.time.validate()?;

        debug!(
            n_lat = metadata.grid.n_lat,
            n_lon = metadata.grid.n_lon,
            n_time = metadata.time.len,
            source = %metadata.source,
            "Opened cutout"
        );

        Ok(Self { storage, metadata })
    }

    /// Create an empty cutout with the given metadata.
    pub fn create(storage: ReadableWritableListableStorage, metadata: CutoutMetadata) -> Result<Self> {
        metadata.grid.validate()?;
        metadata.time.validate()?;

        let attrs = match serde_json::to_value(&metadata) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => {
                return Err(CutoutError::InvalidMetadata(
                    "cutout metadata is not an object".to_string(),
                ))
            }
            Err(e) => return Err(CutoutError::InvalidMetadata(e.to_string())),
        };

        let group = GroupBuilder::new()
            .attributes(attrs)
            .build(Arc::clone(&storage), "/")
            .map_err(|e| CutoutError::write_failed("/", e))?;
        group
            .store_metadata()
            .map_err(|e| CutoutError::write_failed("/", e))?;

        Ok(Self { storage, metadata })
    }

    pub fn metadata(&self) -> &CutoutMetadata {
        &self.metadata
    }

    /// Shape of a variable: `[time, lat, lon]` or `[lat, lon]` when static.
    pub fn variable_shape(&self, is_static: bool) -> Vec<u64> {
        let grid = &self.metadata.grid;
        if is_static {
            vec![grid.n_lat as u64, grid.n_lon as u64]
        } else {
            vec![
                self.metadata.time.len as u64,
                grid.n_lat as u64,
                grid.n_lon as u64,
            ]
        }
    }

    /// Whether a variable array exists.
    pub fn has_variable(&self, name: &str) -> Result<bool> {
        Ok(sidecar::key_exists(
            &*self.storage,
            &format!("{}/zarr.json", name),
        )?)
    }

    /// Write a whole variable, creating the array with `chunk_rows` rows per chunk.
    ///
    /// Time-varying variables are chunked over the full time axis and all
    /// longitudes so that a latitude band is one read per chunk row.
    pub fn write_variable(
        &self,
        name: &str,
        is_static: bool,
        chunk_rows: usize,
        data: &[f32],
    ) -> Result<()> {
        let shape = self.variable_shape(is_static);
        let expected: u64 = shape.iter().product();
        if data.len() as u64 != expected {
            return Err(CutoutError::ShapeMismatch {
                variable: name.to_string(),
                expected: shape,
                actual: vec![data.len() as u64],
            });
        }

        let mut chunk_shape = shape.clone();
        let lat_axis = if is_static { 0 } else { 1 };
        chunk_shape[lat_axis] = (chunk_rows.max(1) as u64).min(shape[lat_axis]);

        let array = self.create_array(name, shape.clone(), chunk_shape)?;
        let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)
            .map_err(|e| CutoutError::write_failed(name, e))?;
        array
            .store_array_subset_elements(&subset, data)
            .map_err(|e| CutoutError::write_failed(name, e))
    }

    /// Rows whose features are recorded as prepared.
    pub fn prepared_ranges(&self) -> Result<PreparedRanges> {
        Ok(sidecar::read_record(&*self.storage, PREPARED_KEY)?.unwrap_or_default())
    }

    fn create_array(&self, name: &str, shape: Vec<u64>, chunk_shape: Vec<u64>) -> Result<CutoutArray> {
        let dimension_names = if shape.len() == 2 {
            vec!["lat", "lon"]
        } else {
            vec!["time", "lat", "lon"]
        };

        let array = ArrayBuilder::new(
            shape,
            DataType::Float32,
            chunk_shape
                .try_into()
                .map_err(|e| CutoutError::write_failed(name, format!("{:?}", e)))?,
            FillValue::from(f32::NAN),
        )
        .dimension_names(dimension_names.into())
        .build(Arc::clone(&self.storage), &format!("/{}", name))
        .map_err(|e| CutoutError::write_failed(name, e))?;

        array
            .store_metadata()
            .map_err(|e| CutoutError::write_failed(name, e))?;

        Ok(array)
    }

    fn open_array(&self, name: &str, is_static: bool) -> Result<CutoutArray> {
        let array = Array::open(Arc::clone(&self.storage), &format!("/{}", name))
            .map_err(|e| CutoutError::read_failed(name, e))?;

        let expected = self.variable_shape(is_static);
        if array.shape() != expected.as_slice() {
            return Err(CutoutError::ShapeMismatch {
                variable: name.to_string(),
                expected,
                actual: array.shape().to_vec(),
            });
        }
        Ok(array)
    }

    fn chunk_shape_of(name: &str, array: &CutoutArray) -> Result<Vec<u64>> {
        let origin = vec![0u64; array.shape().len()];
        let chunk_shape = array
            .chunk_grid()
            .chunk_shape(&origin, array.shape())
            .map_err(|e| CutoutError::read_failed(name, e))?
            .ok_or_else(|| CutoutError::read_failed(name, "missing chunk shape"))?;
        Ok(chunk_shape.iter().map(|d| d.get()).collect())
    }

    /// Subset covering `rows` (and `times` for time-varying variables).
    fn region(
        &self,
        name: &str,
        is_static: bool,
        rows: &Range<usize>,
        times: &Range<usize>,
    ) -> Result<ArraySubset> {
        let n_lon = self.metadata.grid.n_lon as u64;
        let (start, shape) = if is_static {
            (
                vec![rows.start as u64, 0],
                vec![rows.len() as u64, n_lon],
            )
        } else {
            (
                vec![times.start as u64, rows.start as u64, 0],
                vec![times.len() as u64, rows.len() as u64, n_lon],
            )
        };
        ArraySubset::new_with_start_shape(start, shape).map_err(|e| CutoutError::read_failed(name, e))
    }

    fn read_region(
        &self,
        name: &str,
        is_static: bool,
        rows: &Range<usize>,
        times: &Range<usize>,
    ) -> Result<Vec<f32>> {
        let array = self.open_array(name, is_static)?;
        let subset = self.region(name, is_static, rows, times)?;
        array
            .retrieve_array_subset_elements::<f32>(&subset)
            .map_err(|e| CutoutError::read_failed(name, e))
    }

    fn check_rows(&self, rows: &Range<usize>) -> Result<()> {
        if !self.metadata.grid.contains_rows(rows) {
            return Err(CutoutError::OutOfBounds {
                axis: "lat",
                requested: format!("{:?}", rows),
                len: self.metadata.grid.n_lat,
            });
        }
        Ok(())
    }

    fn check_times(&self, times: &Range<usize>) -> Result<()> {
        if times.start > times.end || times.end > self.metadata.time.len {
            return Err(CutoutError::OutOfBounds {
                axis: "time",
                requested: format!("{:?}", times),
                len: self.metadata.time.len,
            });
        }
        Ok(())
    }

    /// Derive one feature for `rows` from its raw variables.
    fn derive_feature(&self, feature: Feature, rows: &Range<usize>) -> Result<()> {
        let name = feature.array_name();
        let is_static = feature.is_static();
        let times = 0..self.metadata.time.len;

        let mut sources = Vec::with_capacity(feature.sources().len());
        for source in feature.sources() {
            sources.push(self.read_region(source, is_static, rows, &times)?);
        }
        let values = feature.derive(&sources);

        let array = if self.has_variable(name)? {
            self.open_array(name, is_static)?
        } else {
            let source = self.open_array(feature.sources()[0], is_static)?;
            let chunk_shape = Self::chunk_shape_of(feature.sources()[0], &source)?;
            self.create_array(name, self.variable_shape(is_static), chunk_shape)?
        };

        let subset = self.region(name, is_static, rows, &times)?;
        array
            .store_array_subset_elements(&subset, values.as_slice())
            .map_err(|e| CutoutError::write_failed(name, e))
    }
}

impl CutoutProvider for ZarrCutout {
    fn grid(&self) -> &Grid {
        &self.metadata.grid
    }

    fn time_axis(&self) -> &TimeAxis {
        &self.metadata.time
    }

    fn source(&self) -> &str {
        &self.metadata.source
    }

    fn is_prepared(&self, rows: Range<usize>) -> Result<bool> {
        self.check_rows(&rows)?;
        Ok(self.prepared_ranges()?.covers(&rows))
    }

    fn prepare_region(&self, rows: Range<usize>) -> Result<PrepareReport> {
        self.check_rows(&rows)?;

        let mut ledger = self.prepared_ranges()?;
        let mut report = PrepareReport {
            rows: rows.clone(),
            ..Default::default()
        };
        if ledger.covers(&rows) {
            debug!(rows = ?rows, "Features already prepared");
            report.already_prepared = true;
            return Ok(report);
        }

        let times = 0..self.metadata.time.len;
        for feature in Feature::ALL {
            let mut missing = Vec::new();
            for source in feature.sources() {
                if !self.has_variable(source)? {
                    missing.push(*source);
                }
            }

            if missing.is_empty() {
                self.derive_feature(feature, &rows)?;
                report.derived.push(feature.array_name().to_string());
            } else if self.has_variable(feature.array_name())? {
                // Reading the band proves the array is present and decodable.
                self.read_region(feature.array_name(), feature.is_static(), &rows, &times)?;
                report.validated.push(feature.array_name().to_string());
            } else {
                return Err(CutoutError::MissingVariable {
                    feature: feature.array_name().to_string(),
                    variable: missing[0].to_string(),
                });
            }
        }

        ledger.insert(rows.clone());
        sidecar::write_record(&*self.storage, PREPARED_KEY, &ledger)?;

        info!(
            rows = ?rows,
            derived = ?report.derived,
            validated = ?report.validated,
            "Prepared cutout features"
        );
        Ok(report)
    }

    fn load_region(&self, rows: Range<usize>, times: Range<usize>) -> Result<WeatherFields> {
        self.check_rows(&rows)?;
        self.check_times(&times)?;

        let mut layers = Vec::with_capacity(Feature::ALL.len());
        for feature in Feature::ALL {
            if !self.has_variable(feature.array_name())? {
                return Err(CutoutError::MissingVariable {
                    feature: feature.array_name().to_string(),
                    variable: feature.array_name().to_string(),
                });
            }
            layers.push(self.read_region(
                feature.array_name(),
                feature.is_static(),
                &rows,
                &times,
            )?);
        }

        let land_mask = layers.pop().unwrap_or_default();
        let temperature = layers.pop().unwrap_or_default();
        let influx = layers.pop().unwrap_or_default();
        let wind_speed = layers.pop().unwrap_or_default();

        let fields = WeatherFields {
            lats: self.metadata.grid.lats(rows.clone()),
            lons: self.metadata.grid.lons(),
            times: times.clone().map(|t| self.metadata.time.time_at(t)).collect(),
            rows,
            wind_speed,
            influx,
            temperature,
            land_mask,
            reference_height_m: self.metadata.wind_reference_height_m,
        };
        fields.validate()?;
        Ok(fields)
    }
}
