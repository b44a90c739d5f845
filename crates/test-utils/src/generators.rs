//! Generators for synthetic weather fields.
//!
//! These build [`WeatherFields`] directly, without a cutout store, for unit
//! tests of the conversion models and the evaluator.

use chrono::{DateTime, Duration, Utc};
use cutout::WeatherFields;

/// Values used for every cell and hour by [`uniform_fields`].
#[derive(Debug, Clone, Copy)]
pub struct UniformWeather {
    /// Wind speed at 100 m (m/s).
    pub wind_speed: f32,
    /// Global horizontal irradiance (W/m²).
    pub influx: f32,
    /// Air temperature (K).
    pub temperature: f32,
    /// 1 land, 0 sea, NaN unknown.
    pub land: f32,
}

impl Default for UniformWeather {
    fn default() -> Self {
        Self {
            wind_speed: 8.0,
            influx: 500.0,
            temperature: 288.15,
            land: 1.0,
        }
    }
}

/// `n` hourly timestamps starting at `start`.
pub fn hourly_times(start: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
    (0..n)
        .map(|i| start + Duration::hours(i as i64))
        .collect()
}

/// Creates weather fields with the same weather everywhere.
///
/// Rows are numbered from 0 and cover `lats`; the reference height is 100 m.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use test_utils::{uniform_fields, UniformWeather};
///
/// let start = Utc.with_ymd_and_hms(2013, 1, 1, 1, 0, 0).unwrap();
/// let fields = uniform_fields(&[10.0, 5.0], &[0.0, 5.0, 10.0], start, 4, UniformWeather::default());
/// assert_eq!(fields.wind_speed.len(), 4 * 2 * 3);
/// assert_eq!(fields.land_mask.len(), 2 * 3);
/// ```
pub fn uniform_fields(
    lats: &[f64],
    lons: &[f64],
    start: DateTime<Utc>,
    n_time: usize,
    weather: UniformWeather,
) -> WeatherFields {
    let cells = lats.len() * lons.len();
    let values = n_time * cells;
    WeatherFields {
        rows: 0..lats.len(),
        lats: lats.to_vec(),
        lons: lons.to_vec(),
        times: hourly_times(start, n_time),
        wind_speed: vec![weather.wind_speed; values],
        influx: vec![weather.influx; values],
        temperature: vec![weather.temperature; values],
        land_mask: vec![weather.land; cells],
        reference_height_m: 100.0,
    }
}

/// Replaces the land mask with a coastline: the western half of the columns
/// is land, the eastern half sea.
pub fn with_coastline(mut fields: WeatherFields) -> WeatherFields {
    let n_lon = fields.n_lon();
    for (i, value) in fields.land_mask.iter_mut().enumerate() {
        *value = if (i % n_lon) < n_lon / 2 { 1.0 } else { 0.0 };
    }
    fields
}

/// Fills wind speeds with deterministic pseudo-random values between 0 and 40 m/s.
///
/// Uses a simple hash of (time, row, col, seed) for reproducibility.
pub fn with_gusty_wind(mut fields: WeatherFields, seed: u32) -> WeatherFields {
    let (n_rows, n_lon) = (fields.n_rows(), fields.n_lon());
    for t in 0..fields.n_time() {
        for row in 0..n_rows {
            for col in 0..n_lon {
                let hash = simple_hash(t as u32, (row * n_lon + col) as u32, seed);
                let idx = fields.index(t, row, col);
                fields.wind_speed[idx] = (hash % 4000) as f32 / 100.0;
            }
        }
    }
    fields
}

/// Marks every time-varying value at the given `(t, row, col)` positions missing.
pub fn with_missing(mut fields: WeatherFields, positions: &[(usize, usize, usize)]) -> WeatherFields {
    for &(t, row, col) in positions {
        if t < fields.n_time() && row < fields.n_rows() && col < fields.n_lon() {
            let idx = fields.index(t, row, col);
            fields.wind_speed[idx] = f32::NAN;
            fields.influx[idx] = f32::NAN;
            fields.temperature[idx] = f32::NAN;
        }
    }
    fields
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
