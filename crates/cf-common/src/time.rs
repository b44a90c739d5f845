//! Regular time axis of a cutout.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// A regular time axis. Each timestamp labels the end of its accumulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAxis {
    pub start: DateTime<Utc>,
    #[serde(default = "default_step_hours")]
    pub step_hours: u32,
    pub len: usize,
}

fn default_step_hours() -> u32 {
    1
}

impl TimeAxis {
    /// Hourly axis of `len` steps.
    pub fn hourly(start: DateTime<Utc>, len: usize) -> Self {
        Self {
            start,
            step_hours: 1,
            len,
        }
    }

    pub fn validate(&self) -> CommonResult<()> {
        if self.step_hours == 0 {
            return Err(CommonError::InvalidTimeAxis(
                "step_hours must be > 0".to_string(),
            ));
        }
        if self.len == 0 {
            return Err(CommonError::InvalidTimeAxis(
                "time axis is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Timestamp of step `index`.
    pub fn time_at(&self, index: usize) -> DateTime<Utc> {
        self.start + Duration::hours(index as i64 * self.step_hours as i64)
    }

    /// All timestamps of the axis.
    pub fn times(&self) -> Vec<DateTime<Utc>> {
        (0..self.len).map(|i| self.time_at(i)).collect()
    }

    /// Whole hours since the Unix epoch, the encoding used for the `time` coordinate.
    pub fn hours_since_epoch(&self) -> Vec<i64> {
        (0..self.len)
            .map(|i| self.time_at(i).timestamp() / 3600)
            .collect()
    }
}
