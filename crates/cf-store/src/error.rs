//! Error types for the capacity-factor store.

use std::ops::Range;

use thiserror::Error;

use cf_common::CommonError;

/// Errors that can occur while creating, opening or writing the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The location holds data that is not a capacity-factor store.
    #[error("not a capacity-factor store: {0}")]
    NotACfStore(String),

    /// An existing store was built with a different layout.
    #[error("existing store {field} is {existing}, requested {requested}")]
    LayoutMismatch {
        field: &'static str,
        existing: String,
        requested: String,
    },

    /// The requested layout cannot be stored.
    #[error("invalid store layout: {0}")]
    InvalidLayout(String),

    /// A region write does not start and end on latitude chunk boundaries.
    #[error("rows {rows:?} are not aligned to latitude chunks of {lat_chunk} (grid has {n_lat} rows)")]
    Misaligned {
        rows: Range<usize>,
        lat_chunk: usize,
        n_lat: usize,
    },

    /// Rows outside the grid.
    #[error("rows {rows:?} are outside the grid of {n_lat} rows")]
    OutOfBounds { rows: Range<usize>, n_lat: usize },

    /// Region data does not have the size of the region.
    #[error("{what} has {actual} values, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A completion marker exists but cannot be decoded.
    #[error("corrupt completion marker at '{key}': {message}")]
    CorruptMarker { key: String, message: String },

    /// Store metadata exists but cannot be decoded.
    #[error("corrupt store metadata: {0}")]
    CorruptMetadata(String),

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    ZarrError(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Sidecar record error.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl StoreError {
    /// Create a ZarrError.
    pub fn zarr_error(msg: impl ToString) -> Self {
        Self::ZarrError(msg.to_string())
    }

    /// Create a StorageError.
    pub fn storage_error(msg: impl ToString) -> Self {
        Self::StorageError(msg.to_string())
    }

    /// Whether the store itself is damaged, as opposed to a single write failing.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptMarker { .. }
                | Self::CorruptMetadata(_)
                | Self::Common(CommonError::CorruptRecord { .. })
        )
    }

    /// Whether the error stems from an existing store that cannot be reused.
    pub fn is_incompatible_store(&self) -> bool {
        matches!(
            self,
            Self::NotACfStore(_) | Self::LayoutMismatch { .. } | Self::InvalidLayout(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
