//! Error types for cutout access and preparation.

use thiserror::Error;

use cf_common::CommonError;

/// Errors that can occur while opening, preparing or reading a cutout.
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Failed to open the cutout store.
    #[error("failed to open cutout: {0}")]
    OpenFailed(String),

    /// Cutout attributes are missing or malformed.
    #[error("invalid cutout metadata: {0}")]
    InvalidMetadata(String),

    /// Neither a feature nor the raw variables it derives from are present.
    #[error("missing variable '{variable}' (needed for feature '{feature}')")]
    MissingVariable { feature: String, variable: String },

    /// A variable has a shape that does not match the cutout grid.
    #[error("variable '{variable}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        variable: String,
        expected: Vec<u64>,
        actual: Vec<u64>,
    },

    /// The requested region is outside the cutout.
    #[error("requested {axis} range {requested} is outside [0, {len})")]
    OutOfBounds {
        axis: &'static str,
        requested: String,
        len: usize,
    },

    /// Failed to read data from the cutout.
    #[error("failed to read '{variable}': {message}")]
    ReadFailed { variable: String, message: String },

    /// Failed to write a derived feature.
    #[error("failed to write '{variable}': {message}")]
    WriteFailed { variable: String, message: String },

    /// Sidecar ledger or storage error.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CutoutError {
    pub fn read_failed(variable: impl Into<String>, message: impl ToString) -> Self {
        Self::ReadFailed {
            variable: variable.into(),
            message: message.to_string(),
        }
    }

    pub fn write_failed(variable: impl Into<String>, message: impl ToString) -> Self {
        Self::WriteFailed {
            variable: variable.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for cutout operations.
pub type Result<T> = std::result::Result<T, CutoutError>;
