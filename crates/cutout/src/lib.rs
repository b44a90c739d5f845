//! Weather-reanalysis cutouts.
//!
//! A cutout holds raw reanalysis variables on a regular lat/lon grid. Before
//! capacity factors can be computed, the variables are turned into the
//! features the conversion models need (see [`Feature`]). Preparation is
//! tracked per latitude band so that it can be done once for the whole grid
//! or lazily, band by band.

pub mod error;
pub mod features;
pub mod fields;
pub mod ledger;
pub mod provider;
pub mod testdata;
pub mod zarr;

pub use error::{CutoutError, Result};
pub use features::Feature;
pub use fields::WeatherFields;
pub use ledger::PreparedRanges;
pub use provider::{CutoutProvider, PrepareReport};
pub use zarr::{CutoutMetadata, ZarrCutout};
