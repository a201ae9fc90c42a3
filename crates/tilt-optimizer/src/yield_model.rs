//! Clear-sky reference yield model
//!
//! Sun position uses Cooper's declination and the hour angle at the middle
//! of every hour. Beam irradiance follows Meinel's air-mass attenuation.
//! Each row contributes `max(0, cos θ)·G·area·efficiency`, where θ is the
//! angle between the sun and the row normal.

use crate::evaluator::{ObjectiveKind, YieldModel, YieldReport};
use crate::layout::PanelRow;
use crate::snapshot::LayoutSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const SOLAR_CONSTANT_W_M2: f64 = 1000.0;
const DAYS_PER_YEAR: u32 = 365;
const HOURS_PER_DAY: usize = 24;

/// Site and sampling parameters of the clear-sky model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearSkyYieldModel {
    /// Site latitude in degrees, positive north
    pub latitude_deg: f64,
    /// Day simulated by the daily objective (1..=365)
    pub day_of_year: u32,
    /// Evenly spaced days simulated by the yearly objective
    pub sample_days: u32,
}

impl Default for ClearSkyYieldModel {
    fn default() -> Self {
        Self {
            latitude_deg: 40.0,
            day_of_year: 172,
            sample_days: 12,
        }
    }
}

/// Unit vector towards the sun in (east, north, up) coordinates
#[derive(Debug, Clone, Copy)]
struct SunVector {
    east: f64,
    north: f64,
    up: f64,
}

fn declination(day_of_year: u32) -> f64 {
    (23.45f64).to_radians() * (2.0 * PI * (284.0 + f64::from(day_of_year)) / 365.0).sin()
}

fn sun_vector(latitude: f64, declination: f64, hour: f64) -> SunVector {
    let hour_angle = (15.0 * (hour - 12.0)).to_radians();
    SunVector {
        east: -declination.cos() * hour_angle.sin(),
        north: latitude.cos() * declination.sin()
            - latitude.sin() * declination.cos() * hour_angle.cos(),
        up: latitude.sin() * declination.sin()
            + latitude.cos() * declination.cos() * hour_angle.cos(),
    }
}

/// Beam irradiance for a sun at the given elevation sine
fn beam_irradiance(sin_altitude: f64) -> f64 {
    if sin_altitude <= 0.0 {
        return 0.0;
    }
    let air_mass = 1.0 / sin_altitude;
    SOLAR_CONSTANT_W_M2 * 0.7f64.powf(air_mass.powf(0.678))
}

impl ClearSkyYieldModel {
    /// Create a model for a site
    pub fn new(latitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            ..Self::default()
        }
    }

    /// Builder-style day override
    pub fn with_day(mut self, day_of_year: u32) -> Self {
        self.day_of_year = day_of_year;
        self
    }

    /// Builder-style yearly sampling override
    pub fn with_sample_days(mut self, sample_days: u32) -> Self {
        self.sample_days = sample_days;
        self
    }

    /// Output of one row for a sun vector, in watts
    fn row_output(row: &PanelRow, sun: SunVector, irradiance: f64) -> f64 {
        // Positive tilt leans the normal towards the row azimuth
        let normal_east = -row.tilt.sin() * row.azimuth.sin();
        let normal_north = -row.tilt.sin() * row.azimuth.cos();
        let normal_up = row.tilt.cos();

        let cos_incidence = sun.east * normal_east + sun.north * normal_north + sun.up * normal_up;
        cos_incidence.max(0.0) * irradiance * row.area * row.efficiency
    }

    /// Hourly energy of the whole layout on one day, in watt-hours
    pub fn hourly_series(&self, day_of_year: u32, rows: &[PanelRow]) -> Vec<f64> {
        let latitude = self.latitude_deg.to_radians();
        let declination = declination(day_of_year);

        (0..HOURS_PER_DAY)
            .map(|hour| {
                let sun = sun_vector(latitude, declination, hour as f64 + 0.5);
                let irradiance = beam_irradiance(sun.up);
                if irradiance == 0.0 {
                    return 0.0;
                }
                rows.iter()
                    .map(|row| Self::row_output(row, sun, irradiance))
                    .sum()
            })
            .collect()
    }

    /// Days simulated by the yearly objective
    pub fn sampled_days(&self) -> Vec<u32> {
        let samples = self.sample_days.clamp(1, DAYS_PER_YEAR);
        let spacing = f64::from(DAYS_PER_YEAR) / f64::from(samples);
        (0..samples)
            .map(|i| (f64::from(i) * spacing + spacing / 2.0).floor() as u32 + 1)
            .collect()
    }

    /// Simulate synchronously
    pub fn simulate_now(&self, kind: ObjectiveKind, layout: &LayoutSnapshot) -> YieldReport {
        match kind {
            ObjectiveKind::Daily => {
                let day = self.day_of_year.clamp(1, DAYS_PER_YEAR);
                YieldReport::daily(self.hourly_series(day, layout.rows()))
            }
            ObjectiveKind::Yearly => {
                let days = self.sampled_days();
                let series = days
                    .iter()
                    .map(|&day| self.hourly_series(day, layout.rows()).iter().sum())
                    .collect();
                YieldReport::yearly(series, days.len() as u32)
            }
        }
    }
}

#[async_trait]
impl YieldModel for ClearSkyYieldModel {
    async fn simulate(&self, kind: ObjectiveKind, layout: &LayoutSnapshot) -> YieldReport {
        self.simulate_now(kind, layout)
    }
}
