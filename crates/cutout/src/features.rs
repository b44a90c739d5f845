//! Derived cutout features and the raw reanalysis variables they come from.

use std::fmt;

/// Seconds in one accumulation hour, used to turn J/m² into W/m².
const SECONDS_PER_HOUR: f32 = 3600.0;

/// Land-sea mask threshold: cells with at least this land fraction are land.
pub const LAND_FRACTION_THRESHOLD: f32 = 0.5;

/// A feature required by the conversion models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Wind speed at the cutout reference height (m/s).
    WindSpeed,
    /// Global horizontal irradiance (W/m²).
    Influx,
    /// 2 m air temperature (K).
    Temperature,
    /// 1 for land, 0 for sea.
    LandMask,
}

impl Feature {
    /// Every feature, in preparation order.
    pub const ALL: [Feature; 4] = [
        Feature::WindSpeed,
        Feature::Influx,
        Feature::Temperature,
        Feature::LandMask,
    ];

    /// Name of the feature array in the cutout.
    pub fn array_name(&self) -> &'static str {
        match self {
            Feature::WindSpeed => "wnd100m",
            Feature::Influx => "influx",
            Feature::Temperature => "temperature",
            Feature::LandMask => "land_mask",
        }
    }

    /// Raw variables the feature is derived from.
    pub fn sources(&self) -> &'static [&'static str] {
        match self {
            Feature::WindSpeed => &["u100", "v100"],
            Feature::Influx => &["ssrd"],
            Feature::Temperature => &["t2m"],
            Feature::LandMask => &["lsm"],
        }
    }

    /// Static features are `[lat, lon]`; the rest are `[time, lat, lon]`.
    pub fn is_static(&self) -> bool {
        matches!(self, Feature::LandMask)
    }

    /// Derive the feature element-wise from its source slices.
    ///
    /// `sources` must hold one equally sized slice per entry of
    /// [`Feature::sources`], in the same order.
    pub fn derive(&self, sources: &[Vec<f32>]) -> Vec<f32> {
        match self {
            Feature::WindSpeed => sources[0]
                .iter()
                .zip(&sources[1])
                .map(|(u, v)| (u * u + v * v).sqrt())
                .collect(),
            Feature::Influx => sources[0]
                .iter()
                .map(|ssrd| {
                    if ssrd.is_nan() {
                        f32::NAN
                    } else {
                        ssrd.max(0.0) / SECONDS_PER_HOUR
                    }
                })
                .collect(),
            Feature::Temperature => sources[0].clone(),
            Feature::LandMask => sources[0]
                .iter()
                .map(|lsm| {
                    if lsm.is_nan() {
                        f32::NAN
                    } else if *lsm >= LAND_FRACTION_THRESHOLD {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect(),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.array_name())
    }
}
