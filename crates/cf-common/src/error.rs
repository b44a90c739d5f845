//! Error types shared by the grid and sidecar helpers.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid time axis: {0}")]
    InvalidTimeAxis(String),

    #[error("Invalid store key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt record at '{key}': {message}")]
    CorruptRecord { key: String, message: String },
}

impl CommonError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
