//! Chunked, resumable store for global capacity-factor cubes.
//!
//! The store is created once with its final shape and filled band by band.
//! Each band is written chunk-aligned along latitude and then recorded with a
//! completion marker, so an interrupted run can be resumed by skipping every
//! band that has a marker.

pub mod config;
pub mod error;
pub mod layout;
pub mod markers;
pub mod store;

pub use config::{StoreConfig, ZarrCompression};
pub use error::{Result, StoreError};
pub use layout::{Chunking, StoreLayout};
pub use markers::{CompletionMarker, COMPLETED_PREFIX, RUN_SUMMARY_KEY};
pub use store::{CfStore, TOOL_NAME};
