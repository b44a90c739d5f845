//! The interface the pipeline uses to talk to a weather cutout.

use std::ops::Range;

use cf_common::{Grid, TimeAxis};

use crate::error::Result;
use crate::fields::WeatherFields;

/// Outcome of preparing features for a latitude band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Rows that were requested.
    pub rows: Range<usize>,
    /// Features derived from raw variables.
    pub derived: Vec<String>,
    /// Features that already existed and were only validated.
    pub validated: Vec<String>,
    /// The rows were already recorded as prepared; nothing was done.
    pub already_prepared: bool,
}

/// Source of weather fields on a regular lat/lon grid.
///
/// Implementations must be safe to share between threads; the pipeline holds
/// one provider for the whole run.
pub trait CutoutProvider: Send + Sync {
    /// The cutout grid.
    fn grid(&self) -> &Grid;

    /// The cutout time axis.
    fn time_axis(&self) -> &TimeAxis;

    /// Short description of the data source, recorded in output attributes.
    fn source(&self) -> &str;

    /// Whether features for `rows` are already materialized.
    fn is_prepared(&self, rows: Range<usize>) -> Result<bool>;

    /// Materialize features for `rows`. Must be idempotent.
    fn prepare_region(&self, rows: Range<usize>) -> Result<PrepareReport>;

    /// Read prepared features for a band of rows and a window of time steps.
    fn load_region(&self, rows: Range<usize>, times: Range<usize>) -> Result<WeatherFields>;
}

impl<P: CutoutProvider + ?Sized> CutoutProvider for &P {
    fn grid(&self) -> &Grid {
        (**self).grid()
    }

    fn time_axis(&self) -> &TimeAxis {
        (**self).time_axis()
    }

    fn source(&self) -> &str {
        (**self).source()
    }

    fn is_prepared(&self, rows: Range<usize>) -> Result<bool> {
        (**self).is_prepared(rows)
    }

    fn prepare_region(&self, rows: Range<usize>) -> Result<PrepareReport> {
        (**self).prepare_region(rows)
    }

    fn load_region(&self, rows: Range<usize>, times: Range<usize>) -> Result<WeatherFields> {
        (**self).load_region(rows, times)
    }
}
