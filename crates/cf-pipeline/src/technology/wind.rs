//! Wind turbines: hub-height extrapolation and power curves.

use cutout::WeatherFields;

use super::ConversionModel;

/// Exponent of the power-law wind profile.
pub const POWER_LAW_EXPONENT: f64 = 1.0 / 7.0;

/// A turbine's power curve, normalized to rated power.
///
/// `speeds` are ascending hub-height wind speeds in m/s; `power` holds the
/// output at each speed as a fraction of rated power. Output is zero below
/// the first point and above `cut_out`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurbineCurve {
    pub name: &'static str,
    pub hub_height_m: f64,
    pub cut_out: f64,
    pub speeds: &'static [f64],
    pub power: &'static [f64],
}

pub const VESTAS_V112_3MW: TurbineCurve = TurbineCurve {
    name: "Vestas_V112_3MW",
    hub_height_m: 119.0,
    cut_out: 25.0,
    speeds: &[
        3.0, 3.5, 4.0, 4.5, 5.0, 5.5, 6.0, 6.5, 7.0, 7.5, 8.0, 8.5, 9.0, 9.5, 10.0, 10.5, 11.0,
        11.5, 12.0, 12.5, 13.0, 25.0,
    ],
    power: &[
        0.0075, 0.0221, 0.0423, 0.0670, 0.0979, 0.1359, 0.1811, 0.2341, 0.2966, 0.3675, 0.4478,
        0.5369, 0.6283, 0.7190, 0.8055, 0.8780, 0.9346, 0.9681, 0.9850, 0.9941, 0.9977, 1.0,
    ],
};

pub const NREL_5MW_OFFSHORE: TurbineCurve = TurbineCurve {
    name: "NREL_ReferenceTurbine_5MW_offshore",
    hub_height_m: 90.0,
    cut_out: 25.0,
    speeds: &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 11.4, 25.0],
    power: &[
        0.0080, 0.0355, 0.0807, 0.1475, 0.2374, 0.3542, 0.5037, 0.6897, 0.9125, 1.0, 1.0,
    ],
};

pub const ENERCON_E82_3000KW: TurbineCurve = TurbineCurve {
    name: "Enercon_E82_3000kW",
    hub_height_m: 98.0,
    cut_out: 25.0,
    speeds: &[
        2.5, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0,
        25.0,
    ],
    power: &[
        0.0, 0.0083, 0.0273, 0.0580, 0.1070, 0.1773, 0.2717, 0.3933, 0.5267, 0.6300, 0.7000,
        0.7833, 0.8600, 0.9333, 0.9833, 1.0, 1.0,
    ],
};

const CATALOG: [&TurbineCurve; 3] = [&VESTAS_V112_3MW, &NREL_5MW_OFFSHORE, &ENERCON_E82_3000KW];

/// Look up a turbine by name.
pub fn turbine(name: &str) -> Option<&'static TurbineCurve> {
    CATALOG.iter().copied().find(|curve| curve.name == name)
}

impl TurbineCurve {
    /// Normalized output at hub-height wind speed `speed`.
    pub fn output(&self, speed: f64) -> f64 {
        if speed.is_nan() {
            return f64::NAN;
        }
        let first = self.speeds[0];
        if speed < first || speed > self.cut_out {
            return 0.0;
        }
        // partition_point: first index with speeds[i] > speed
        let upper = self.speeds.partition_point(|&s| s <= speed);
        if upper >= self.speeds.len() {
            return self.power[self.power.len() - 1];
        }
        if upper == 0 {
            return self.power[0];
        }
        let (s0, s1) = (self.speeds[upper - 1], self.speeds[upper]);
        let (p0, p1) = (self.power[upper - 1], self.power[upper]);
        p0 + (p1 - p0) * (speed - s0) / (s1 - s0)
    }
}

/// Wind speed at `to_height` given a measurement at `from_height`.
pub fn extrapolate(speed: f64, from_height: f64, to_height: f64) -> f64 {
    speed * (to_height / from_height).powf(POWER_LAW_EXPONENT)
}

/// Capacity factor of a single turbine type.
#[derive(Debug, Clone, Copy)]
pub struct WindModel {
    curve: &'static TurbineCurve,
}

impl WindModel {
    pub fn new(curve: &'static TurbineCurve) -> Self {
        Self { curve }
    }
}

impl ConversionModel for WindModel {
    fn cell_series(&self, fields: &WeatherFields, row: usize, col: usize, out: &mut [f32]) {
        let from = fields.reference_height_m;
        for (t, value) in out.iter_mut().enumerate() {
            let speed = fields.wind_speed[fields.index(t, row, col)] as f64;
            let hub_speed = extrapolate(speed, from, self.curve.hub_height_m);
            *value = self.curve.output(hub_speed) as f32;
        }
    }
}
