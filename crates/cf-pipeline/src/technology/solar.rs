//! Solar PV: sun position, irradiance on the panel plane and panel output.

use std::f64::consts::PI;

use chrono::{Datelike, Duration, Timelike};
use serde::{Deserialize, Serialize};

use cutout::WeatherFields;

use super::ConversionModel;

/// Irradiance at standard test conditions (W/m²).
pub const STC_IRRADIANCE: f64 = 1000.0;

/// Cell temperature at standard test conditions (°C).
pub const STC_TEMPERATURE: f64 = 25.0;

/// Ground reflectance used for the reflected component.
pub const GROUND_ALBEDO: f64 = 0.2;

/// Solar constant (W/m²).
pub const SOLAR_CONSTANT: f64 = 1367.0;

/// Tilt cap for latitude-optimal panels (degrees).
pub const MAX_OPTIMAL_SLOPE: f64 = 60.0;

/// Lower bound on sin(altitude) when dividing by it near the horizon.
const MIN_SIN_ALTITUDE: f64 = 0.05;

const KELVIN_OFFSET: f64 = 273.15;

/// Panel electrical and thermal parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelModel {
    pub name: &'static str,
    /// Relative power change per kelvin above 25 °C.
    pub temperature_coefficient: f64,
    /// Nominal operating cell temperature (°C).
    pub noct: f64,
}

pub const CSI: PanelModel = PanelModel {
    name: "CSi",
    temperature_coefficient: -0.0044,
    noct: 45.0,
};

pub const CDTE: PanelModel = PanelModel {
    name: "CdTe",
    temperature_coefficient: -0.0025,
    noct: 46.0,
};

const CATALOG: [&PanelModel; 2] = [&CSI, &CDTE];

/// Look up a panel by name.
pub fn panel(name: &str) -> Option<&'static PanelModel> {
    CATALOG.iter().copied().find(|panel| panel.name == name)
}

/// How panels are mounted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Orientation {
    /// Tilted by the absolute latitude (capped), facing the equator.
    #[default]
    LatitudeOptimal,
    /// Fixed slope from horizontal and azimuth clockwise from north, in degrees.
    Fixed { slope: f64, azimuth: f64 },
}

impl Orientation {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Orientation::LatitudeOptimal => Ok(()),
            Orientation::Fixed { slope, azimuth } => {
                if !(0.0..=90.0).contains(&slope) {
                    return Err(format!("slope must be within 0-90°, got {}", slope));
                }
                if !(0.0..=360.0).contains(&azimuth) {
                    return Err(format!("azimuth must be within 0-360°, got {}", azimuth));
                }
                Ok(())
            }
        }
    }

    /// `(slope, azimuth)` in degrees for a panel at `latitude`.
    pub fn angles(&self, latitude: f64) -> (f64, f64) {
        match *self {
            Orientation::LatitudeOptimal => {
                let azimuth = if latitude >= 0.0 { 180.0 } else { 0.0 };
                (latitude.abs().min(MAX_OPTIMAL_SLOPE), azimuth)
            }
            Orientation::Fixed { slope, azimuth } => (slope, azimuth),
        }
    }
}

/// Solar position (azimuth and elevation angles).
#[derive(Debug, Clone, Copy)]
pub struct SolarPosition {
    /// Solar altitude angle in degrees (0 = horizon, 90 = zenith).
    pub altitude: f64,
    /// Solar azimuth angle in degrees from north, clockwise (0=N, 90=E, 180=S, 270=W).
    pub azimuth: f64,
}

impl SolarPosition {
    /// Spencer's algorithm.
    ///
    /// - `latitude`: in degrees (positive north)
    /// - `day_of_year`: 1-366
    /// - `hour`: local solar time in hours (0-24)
    pub fn calculate(latitude: f64, day_of_year: u32, hour: f64) -> Self {
        let lat = latitude.to_radians();
        let gamma = day_angle(day_of_year);

        let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        // 15 degrees per hour from solar noon
        let hour_angle = (hour - 12.0) * 15.0_f64.to_radians();

        let sin_alt =
            lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos();
        let altitude = sin_alt.clamp(-1.0, 1.0).asin().to_degrees();

        let cos_azimuth = (declination.sin() * lat.cos()
            - declination.cos() * lat.sin() * hour_angle.cos())
            / altitude.to_radians().cos().max(1e-10);

        let mut azimuth = cos_azimuth.clamp(-1.0, 1.0).acos().to_degrees();
        if hour_angle > 0.0 {
            azimuth = 360.0 - azimuth;
        }

        Self { altitude, azimuth }
    }

    pub fn is_above_horizon(&self) -> bool {
        self.altitude > 0.0
    }
}

fn day_angle(day_of_year: u32) -> f64 {
    2.0 * PI * (day_of_year.max(1) as f64 - 1.0) / 365.0
}

/// Irradiance on a horizontal plane at the top of the atmosphere (W/m²).
pub fn extraterrestrial_horizontal(day_of_year: u32, altitude: f64) -> f64 {
    let gamma = day_angle(day_of_year);
    let eccentricity = 1.00011
        + 0.034221 * gamma.cos()
        + 0.00128 * gamma.sin()
        + 0.000719 * (2.0 * gamma).cos()
        + 0.000077 * (2.0 * gamma).sin();
    SOLAR_CONSTANT * eccentricity * altitude.to_radians().sin().max(MIN_SIN_ALTITUDE)
}

/// Erbs diffuse fraction as a function of the clearness index.
pub fn erbs_diffuse_fraction(kt: f64) -> f64 {
    if kt <= 0.22 {
        1.0 - 0.09 * kt
    } else if kt <= 0.8 {
        0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
    } else {
        0.165
    }
}

/// Irradiance on a tilted plane from global horizontal irradiance.
///
/// Isotropic sky: beam on the plane, sky diffuse weighted by the visible sky
/// fraction, ground reflection weighted by the visible ground fraction.
pub fn plane_of_array(
    ghi: f64,
    sun: &SolarPosition,
    day_of_year: u32,
    slope: f64,
    azimuth: f64,
) -> f64 {
    if ghi <= 0.0 || !sun.is_above_horizon() {
        return 0.0;
    }

    let alt = sun.altitude.to_radians();
    let sin_alt = alt.sin().max(MIN_SIN_ALTITUDE);
    let kt = (ghi / extraterrestrial_horizontal(day_of_year, sun.altitude)).clamp(0.0, 1.0);
    let dhi = erbs_diffuse_fraction(kt) * ghi;
    let dni = (ghi - dhi) / sin_alt;

    let tilt = slope.to_radians();
    let cos_incidence = alt.sin() * tilt.cos()
        + alt.cos() * tilt.sin() * (sun.azimuth - azimuth).to_radians().cos();

    let direct = dni * cos_incidence.max(0.0);
    let sky = dhi * 0.5 * (1.0 + tilt.cos());
    let ground = ghi * GROUND_ALBEDO * 0.5 * (1.0 - tilt.cos());
    direct + sky + ground
}

impl PanelModel {
    /// Output relative to rated power for irradiance `poa` (W/m²) and ambient
    /// temperature `ambient` (°C).
    pub fn output(&self, poa: f64, ambient: f64) -> f64 {
        if poa <= 0.0 {
            return 0.0;
        }
        let cell = ambient + (self.noct - 20.0) / 800.0 * poa;
        poa / STC_IRRADIANCE * (1.0 + self.temperature_coefficient * (cell - STC_TEMPERATURE))
    }
}

/// Capacity factor of a panel type in a given orientation.
#[derive(Debug, Clone, Copy)]
pub struct SolarModel {
    panel: &'static PanelModel,
    orientation: Orientation,
}

impl SolarModel {
    pub fn new(panel: &'static PanelModel, orientation: Orientation) -> Self {
        Self { panel, orientation }
    }
}

impl ConversionModel for SolarModel {
    fn cell_series(&self, fields: &WeatherFields, row: usize, col: usize, out: &mut [f32]) {
        let lat = fields.lats[row];
        let lon = fields.lons[col];
        let (slope, azimuth) = self.orientation.angles(lat);

        for (t, value) in out.iter_mut().enumerate() {
            let idx = fields.index(t, row, col);
            let ghi = fields.influx[idx] as f64;
            let temperature = fields.temperature[idx] as f64;
            if ghi.is_nan() || temperature.is_nan() {
                *value = f32::NAN;
                continue;
            }

            // Timestamps close the accumulation hour; the sun is placed at its midpoint.
            let mid = fields.times[t] - Duration::minutes(30);
            let utc_hour = mid.hour() as f64 + mid.minute() as f64 / 60.0;
            let solar_hour = (utc_hour + lon / 15.0).rem_euclid(24.0);
            let day = mid.ordinal();

            let sun = SolarPosition::calculate(lat, day, solar_hour);
            let poa = plane_of_array(ghi, &sun, day, slope, azimuth);
            *value = self.panel.output(poa, temperature - KELVIN_OFFSET) as f32;
        }
    }
}
