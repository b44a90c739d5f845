//! The global capacity-factor store.
//!
//! A Zarr V3 group holding:
//! - `cf`: `float32 [technology, time, lat, lon]`, fill value NaN
//! - `is_onshore`: `int8 [lat, lon]`, 1 land, 0 sea, -1 unknown
//! - coordinates `lat`, `lon` (`float64`) and `time` (`int64` hours since the epoch)
//! - `_completed/tile_NNNNN.json` completion markers
//! - `_runs/latest.json`, the summary of the most recent run
//!
//! The root group attributes carry the layout so that a later run can check
//! that it is writing into a compatible store.

use std::ops::Range;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs::storage::{
    ListableStorageTraits, ReadableWritableListableStorage, ReadableWritableListableStorageTraits,
    StorePrefix, WritableStorageTraits,
};

use cf_common::{sidecar, CommonError};

use crate::config::{StoreConfig, ZarrCompression};
use crate::error::{Result, StoreError};
use crate::layout::StoreLayout;
use crate::markers::{CompletionMarker, COMPLETED_PREFIX, RUN_SUMMARY_KEY};

/// Name of the tool recorded in the store attributes.
pub const TOOL_NAME: &str = "green-condor";

const LAYOUT_ATTRIBUTE: &str = "cf_layout";
const CF_ARRAY: &str = "/cf";
const ONSHORE_ARRAY: &str = "/is_onshore";

type StoreArray = Array<dyn ReadableWritableListableStorageTraits>;

/// Handle to an open capacity-factor store.
pub struct CfStore {
    storage: ReadableWritableListableStorage,
    cf: StoreArray,
    is_onshore: StoreArray,
    layout: StoreLayout,
}

impl CfStore {
    /// Create a new store, or reopen a compatible one.
    ///
    /// With `overwrite` everything under the store root is erased first.
    /// Without it, an empty location gets a new store, an existing store must
    /// match `layout`, and anything else is rejected.
    pub fn create_or_open(
        storage: ReadableWritableListableStorage,
        layout: StoreLayout,
        config: &StoreConfig,
        overwrite: bool,
    ) -> Result<Self> {
        layout.validate()?;
        config.validate().map_err(StoreError::ConfigError)?;

        if overwrite {
            Self::truncate(&storage)?;
            return Self::create(storage, layout, config);
        }

        let is_empty = storage
            .list()
            .map_err(StoreError::storage_error)?
            .is_empty();
        if is_empty {
            return Self::create(storage, layout, config);
        }

        let existing = Self::open_existing(storage)?;
        layout.check_compatible(&existing.layout)?;
        info!(
            completed_tiles = existing.completed_markers()?.len(),
            "Reusing existing output store"
        );
        Ok(existing)
    }

    /// Erase every key and prefix below the root, keeping the root itself.
    fn truncate(storage: &ReadableWritableListableStorage) -> Result<()> {
        let listing = storage
            .list_dir(&StorePrefix::root())
            .map_err(StoreError::storage_error)?;
        info!(
            keys = listing.keys().len(),
            prefixes = listing.prefixes().len(),
            "Truncating existing output store"
        );
        for key in listing.keys() {
            storage.erase(key).map_err(StoreError::storage_error)?;
        }
        for prefix in listing.prefixes() {
            storage
                .erase_prefix(prefix)
                .map_err(StoreError::storage_error)?;
        }
        Ok(())
    }

    /// Open an existing store, reading its layout from the root attributes.
    pub fn open_existing(storage: ReadableWritableListableStorage) -> Result<Self> {
        if !sidecar::key_exists(&*storage, "cf/zarr.json")? {
            return Err(StoreError::NotACfStore(
                "location is not empty and has no 'cf' array".to_string(),
            ));
        }

        let group = Group::open(Arc::clone(&storage), "/")
            .map_err(|e| StoreError::NotACfStore(e.to_string()))?;
        let layout_value = group
            .attributes()
            .get(LAYOUT_ATTRIBUTE)
            .cloned()
            .ok_or_else(|| {
                StoreError::NotACfStore(format!("root group has no '{}' attribute", LAYOUT_ATTRIBUTE))
            })?;
        let layout: StoreLayout = serde_json::from_value(layout_value)
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))?;

        let cf = Array::open(Arc::clone(&storage), CF_ARRAY)
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))?;
        let is_onshore = Array::open(Arc::clone(&storage), ONSHORE_ARRAY)
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))?;

        if cf.shape() != layout.shape().as_slice() {
            return Err(StoreError::CorruptMetadata(format!(
                "cf array shape {:?} disagrees with recorded layout {:?}",
                cf.shape(),
                layout.shape()
            )));
        }

        debug!(shape = ?cf.shape(), technologies = ?layout.technologies, "Opened output store");

        Ok(Self {
            storage,
            cf,
            is_onshore,
            layout,
        })
    }

    fn create(
        storage: ReadableWritableListableStorage,
        layout: StoreLayout,
        config: &StoreConfig,
    ) -> Result<Self> {
        let mut attrs = layout.attributes.clone();
        attrs.insert("tool".to_string(), serde_json::json!(TOOL_NAME));
        attrs.insert(
            "technologies".to_string(),
            serde_json::json!(layout.technologies),
        );
        attrs.insert(
            "technology_params".to_string(),
            layout.technology_params.clone(),
        );
        attrs.insert(
            "cutout_source".to_string(),
            serde_json::json!(layout.source),
        );
        attrs.insert(
            LAYOUT_ATTRIBUTE.to_string(),
            serde_json::to_value(&layout).map_err(|e| StoreError::InvalidLayout(e.to_string()))?,
        );

        let group = GroupBuilder::new()
            .attributes(attrs)
            .build(Arc::clone(&storage), "/")
            .map_err(StoreError::zarr_error)?;
        group.store_metadata().map_err(StoreError::zarr_error)?;

        let cf = Self::build_cf_array(&storage, &layout, config)?;
        let is_onshore = Self::build_onshore_array(&storage, &layout)?;
        Self::write_coordinates(&storage, &layout)?;

        info!(
            shape = ?layout.shape(),
            chunks = ?layout.chunk_shape(),
            compression = %config.compression,
            "Created output store"
        );

        Ok(Self {
            storage,
            cf,
            is_onshore,
            layout,
        })
    }

    fn build_cf_array(
        storage: &ReadableWritableListableStorage,
        layout: &StoreLayout,
        config: &StoreConfig,
    ) -> Result<StoreArray> {
        let mut attrs = serde_json::Map::new();
        attrs.insert(
            "long_name".to_string(),
            serde_json::json!("Capacity factor"),
        );
        attrs.insert("units".to_string(), serde_json::json!("1"));
        attrs.insert(
            "technologies".to_string(),
            serde_json::json!(layout.technologies),
        );

        let mut binding = ArrayBuilder::new(
            layout.shape(),
            DataType::Float32,
            layout
                .chunk_shape()
                .try_into()
                .map_err(|e| StoreError::ConfigError(format!("{:?}", e)))?,
            FillValue::from(f32::NAN),
        );
        let mut builder = binding
            .dimension_names(["technology", "time", "lat", "lon"].into())
            .attributes(attrs);

        if config.compression != ZarrCompression::None {
            builder = builder.bytes_to_bytes_codecs(vec![Self::compression_codec(config)?]);
        }

        let array = builder
            .build(Arc::clone(storage), CF_ARRAY)
            .map_err(StoreError::zarr_error)?;
        array.store_metadata().map_err(StoreError::zarr_error)?;
        Ok(array)
    }

    fn build_onshore_array(
        storage: &ReadableWritableListableStorage,
        layout: &StoreLayout,
    ) -> Result<StoreArray> {
        let mut attrs = serde_json::Map::new();
        attrs.insert(
            "long_name".to_string(),
            serde_json::json!("1 if the grid cell is land, 0 if sea, -1 if unknown"),
        );

        let array = ArrayBuilder::new(
            vec![layout.grid.n_lat as u64, layout.grid.n_lon as u64],
            DataType::Int8,
            vec![layout.chunking.lat as u64, layout.chunking.lon as u64]
                .try_into()
                .map_err(|e| StoreError::ConfigError(format!("{:?}", e)))?,
            FillValue::from(-1i8),
        )
        .dimension_names(["lat", "lon"].into())
        .attributes(attrs)
        .build(Arc::clone(storage), ONSHORE_ARRAY)
        .map_err(StoreError::zarr_error)?;
        array.store_metadata().map_err(StoreError::zarr_error)?;
        Ok(array)
    }

    fn write_coordinates(
        storage: &ReadableWritableListableStorage,
        layout: &StoreLayout,
    ) -> Result<()> {
        let lats = layout.grid.lats(0..layout.grid.n_lat);
        let lons = layout.grid.lons();
        let hours = layout.time.hours_since_epoch();

        let lat = Self::coordinate_array(
            storage,
            "lat",
            DataType::Float64,
            FillValue::from(f64::NAN),
            lats.len(),
            "degrees_north",
        )?;
        lat.store_array_subset_elements(&Self::coordinate_subset(lats.len())?, lats.as_slice())
            .map_err(StoreError::zarr_error)?;

        let lon = Self::coordinate_array(
            storage,
            "lon",
            DataType::Float64,
            FillValue::from(f64::NAN),
            lons.len(),
            "degrees_east",
        )?;
        lon.store_array_subset_elements(&Self::coordinate_subset(lons.len())?, lons.as_slice())
            .map_err(StoreError::zarr_error)?;

        let time = Self::coordinate_array(
            storage,
            "time",
            DataType::Int64,
            FillValue::from(0i64),
            hours.len(),
            "hours since 1970-01-01T00:00:00Z",
        )?;
        time.store_array_subset_elements(&Self::coordinate_subset(hours.len())?, hours.as_slice())
            .map_err(StoreError::zarr_error)?;

        Ok(())
    }

    fn coordinate_array(
        storage: &ReadableWritableListableStorage,
        name: &str,
        data_type: DataType,
        fill_value: FillValue,
        len: usize,
        units: &str,
    ) -> Result<StoreArray> {
        let mut attrs = serde_json::Map::new();
        attrs.insert("units".to_string(), serde_json::json!(units));

        let array = ArrayBuilder::new(
            vec![len as u64],
            data_type,
            vec![len.max(1) as u64]
                .try_into()
                .map_err(|e| StoreError::ConfigError(format!("{:?}", e)))?,
            fill_value,
        )
        .dimension_names([name].into())
        .attributes(attrs)
        .build(Arc::clone(storage), &format!("/{}", name))
        .map_err(StoreError::zarr_error)?;
        array.store_metadata().map_err(StoreError::zarr_error)?;
        Ok(array)
    }

    fn coordinate_subset(len: usize) -> Result<ArraySubset> {
        ArraySubset::new_with_start_shape(vec![0], vec![len as u64]).map_err(StoreError::zarr_error)
    }

    /// Create the compression codec based on configuration.
    fn compression_codec(
        config: &StoreConfig,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(config.compression_level)
            .map_err(|_| StoreError::ConfigError("Invalid compression level".to_string()))?;

        let shuffle = if config.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = if config.shuffle { Some(4) } else { None };

        let compressor = match config.compression {
            ZarrCompression::None => {
                return Err(StoreError::ConfigError(
                    "No compression configured".to_string(),
                ))
            }
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| StoreError::ConfigError(e.to_string()))?;

        Ok(Arc::new(codec))
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Chunk length along latitude. Tiles must be multiples of it.
    pub fn lat_chunk(&self) -> usize {
        self.layout.chunking.lat
    }

    fn check_region(&self, rows: &Range<usize>) -> Result<()> {
        if !self.layout.is_aligned(rows.start, rows.end) {
            return Err(StoreError::Misaligned {
                rows: rows.clone(),
                lat_chunk: self.layout.chunking.lat,
                n_lat: self.layout.grid.n_lat,
            });
        }
        Ok(())
    }

    fn cf_subset(&self, rows: &Range<usize>) -> Result<ArraySubset> {
        let shape = self.layout.shape();
        ArraySubset::new_with_start_shape(
            vec![0, 0, rows.start as u64, 0],
            vec![shape[0], shape[1], rows.len() as u64, shape[3]],
        )
        .map_err(StoreError::zarr_error)
    }

    fn onshore_subset(&self, rows: &Range<usize>) -> Result<ArraySubset> {
        ArraySubset::new_with_start_shape(
            vec![rows.start as u64, 0],
            vec![rows.len() as u64, self.layout.grid.n_lon as u64],
        )
        .map_err(StoreError::zarr_error)
    }

    /// Write a latitude band of capacity factors and its land mask.
    ///
    /// `data` is `[technology][time][row][lon]` for `rows`, `land_mask` is
    /// `[row][lon]` with 1 land, 0 sea and NaN unknown. The band must be
    /// chunk-aligned along latitude so that every touched chunk is written
    /// whole.
    pub fn write_region(&self, rows: Range<usize>, data: &[f32], land_mask: &[f32]) -> Result<()> {
        self.check_region(&rows)?;

        let expected = self.layout.region_len(rows.len());
        if data.len() != expected {
            return Err(StoreError::ShapeMismatch {
                what: "capacity-factor region",
                expected,
                actual: data.len(),
            });
        }
        let cells = rows.len() * self.layout.grid.n_lon;
        if land_mask.len() != cells {
            return Err(StoreError::ShapeMismatch {
                what: "land mask",
                expected: cells,
                actual: land_mask.len(),
            });
        }

        let onshore: Vec<i8> = land_mask
            .iter()
            .map(|v| {
                if v.is_nan() {
                    -1
                } else if *v >= 0.5 {
                    1
                } else {
                    0
                }
            })
            .collect();

        self.cf
            .store_array_subset_elements(&self.cf_subset(&rows)?, data)
            .map_err(StoreError::storage_error)?;
        self.is_onshore
            .store_array_subset_elements(&self.onshore_subset(&rows)?, onshore.as_slice())
            .map_err(StoreError::storage_error)?;

        debug!(rows = ?rows, values = data.len(), "Wrote capacity-factor region");
        Ok(())
    }

    /// Read a latitude band of capacity factors, `[technology][time][row][lon]`.
    pub fn read_region(&self, rows: Range<usize>) -> Result<Vec<f32>> {
        if !self.layout.grid.contains_rows(&rows) {
            return Err(StoreError::OutOfBounds {
                rows,
                n_lat: self.layout.grid.n_lat,
            });
        }
        self.cf
            .retrieve_array_subset_elements::<f32>(&self.cf_subset(&rows)?)
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))
    }

    /// Read the onshore mask for a latitude band.
    pub fn read_onshore(&self, rows: Range<usize>) -> Result<Vec<i8>> {
        self.is_onshore
            .retrieve_array_subset_elements::<i8>(&self.onshore_subset(&rows)?)
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))
    }

    fn open_coordinate(&self, name: &str) -> Result<(StoreArray, ArraySubset)> {
        let array = Array::open(Arc::clone(&self.storage), &format!("/{}", name))
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))?;
        let subset = ArraySubset::new_with_start_shape(vec![0], array.shape().to_vec())
            .map_err(StoreError::zarr_error)?;
        Ok((array, subset))
    }

    /// Latitude of every row.
    pub fn read_lats(&self) -> Result<Vec<f64>> {
        let (array, subset) = self.open_coordinate("lat")?;
        array
            .retrieve_array_subset_elements::<f64>(&subset)
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))
    }

    /// Time coordinate in hours since the Unix epoch.
    pub fn read_hours(&self) -> Result<Vec<i64>> {
        let (array, subset) = self.open_coordinate("time")?;
        array
            .retrieve_array_subset_elements::<i64>(&subset)
            .map_err(|e| StoreError::CorruptMetadata(e.to_string()))
    }

    pub fn has_completion_marker(&self, tile: usize) -> Result<bool> {
        Ok(sidecar::key_exists(&*self.storage, &CompletionMarker::key(tile))?)
    }

    /// Read the marker of `tile`, if present.
    pub fn completion_marker(&self, tile: usize) -> Result<Option<CompletionMarker>> {
        read_marker(&*self.storage, &CompletionMarker::key(tile))
    }

    /// All completion markers, ordered by tile index.
    pub fn completed_markers(&self) -> Result<Vec<CompletionMarker>> {
        let mut markers = Vec::new();
        for key in sidecar::list_records(&*self.storage, COMPLETED_PREFIX)? {
            match read_marker(&*self.storage, &key)? {
                Some(marker) => markers.push(marker),
                None => warn!(key = %key, "Completion marker vanished while listing"),
            }
        }
        markers.sort_by_key(|m| m.tile);
        Ok(markers)
    }

    /// Record that `tile` has been fully written. Must follow the region write.
    pub fn mark_complete(&self, tile: usize, rows: Range<usize>) -> Result<CompletionMarker> {
        let marker = CompletionMarker::new(tile, rows);
        sidecar::write_record(&*self.storage, &CompletionMarker::key(tile), &marker)?;
        debug!(tile, rows = ?marker.rows(), "Recorded completion marker");
        Ok(marker)
    }

    /// Remove the marker of `tile`, if present.
    pub fn clear_completion_marker(&self, tile: usize) -> Result<()> {
        Ok(sidecar::erase_record(&*self.storage, &CompletionMarker::key(tile))?)
    }

    /// Replace the stored summary of the most recent run.
    pub fn record_run_summary<T: Serialize>(&self, summary: &T) -> Result<()> {
        Ok(sidecar::write_record(&*self.storage, RUN_SUMMARY_KEY, summary)?)
    }

    /// The stored summary of the most recent run.
    pub fn latest_run_summary<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        Ok(sidecar::read_record(&*self.storage, RUN_SUMMARY_KEY)?)
    }
}

fn read_marker(
    storage: &dyn ReadableWritableListableStorageTraits,
    key: &str,
) -> Result<Option<CompletionMarker>> {
    sidecar::read_record(storage, key).map_err(|e| match e {
        CommonError::CorruptRecord { key, message } => StoreError::CorruptMarker { key, message },
        other => StoreError::Common(other),
    })
}
