//! Curvature and refraction correction of sighted height differences.
//!
//! The total correction for a sight of length `d` is
//! `C = (1 - r) * d^2 / (2R)`: earth curvature `d^2 / 2R` partly cancelled by
//! atmospheric refraction `-r * d^2 / 2R`. The refraction coefficient `r`
//! departs from its standard value 0.13 with temperature, pressure, humidity
//! and the hour of observation.
use crate::config::AtmosphericSettings;
use crate::error::{LevelingError, Result};
use crate::store::LevelingLine;
use serde::{Deserialize, Serialize};

/// Mean earth radius (m).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const STANDARD_REFRACTION: f64 = 0.13;
/// Bounds on the adjusted refraction coefficient.
pub const REFRACTION_BOUNDS: (f64, f64) = (0.05, 0.25);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphericConditions {
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_percent: f64,
    /// Local hour of the observation (0-23), if known.
    pub hour_of_day: Option<u8>,
}

impl Default for AtmosphericConditions {
    fn default() -> Self {
        Self { temperature_c: 15.0, pressure_hpa: 1013.25, humidity_percent: 60.0, hour_of_day: None }
    }
}

impl AtmosphericConditions {
    pub fn validate(&self) -> Result<()> {
        if !self.temperature_c.is_finite() || !(self.pressure_hpa.is_finite() && self.pressure_hpa > 0.0) {
            return Err(LevelingError::Configuration(format!(
                "implausible atmosphere: {} °C, {} hPa", self.temperature_c, self.pressure_hpa
            )));
        }
        if !(0.0..=100.0).contains(&self.humidity_percent) {
            return Err(LevelingError::Configuration(format!(
                "humidity must lie in [0, 100] %, got {}", self.humidity_percent
            )));
        }
        if matches!(self.hour_of_day, Some(h) if h > 23) {
            return Err(LevelingError::Configuration(format!(
                "hour of day must lie in 0-23, got {:?}", self.hour_of_day
            )));
        }
        Ok(())
    }

    /// Thermal gradient term: warm midday air bends sights more, cool mornings
    /// and evenings less.
    fn time_of_day_term(&self) -> f64 {
        match self.hour_of_day {
            Some(10..=16) => 0.02,
            Some(h) if h <= 8 || h >= 18 => -0.01,
            _ => 0.0,
        }
    }

    pub fn refraction_coefficient(&self) -> f64 {
        let temperature = -(self.temperature_c - 15.0) * 0.004;
        let pressure = (self.pressure_hpa - 1013.25) * 0.0001;
        let humidity = (self.humidity_percent - 60.0) * 0.0002;
        let r = STANDARD_REFRACTION + temperature + pressure + humidity + self.time_of_day_term();
        r.clamp(REFRACTION_BOUNDS.0, REFRACTION_BOUNDS.1)
    }
}

/// Correction for one sight, all lengths in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericCorrection {
    pub distance_m: f64,
    pub refraction_coefficient: f64,
    pub curvature_m: f64,
    pub refraction_m: f64,
    pub total_m: f64,
}

impl AtmosphericCorrection {
    pub fn total_mm(&self) -> f64 { self.total_m * 1000.0 }
}

pub struct AtmosphericCorrector {
    refraction_coefficient: f64,
    earth_radius_m: f64,
}

impl AtmosphericCorrector {
    pub fn new(conditions: &AtmosphericConditions) -> Self {
        Self { refraction_coefficient: conditions.refraction_coefficient(), earth_radius_m: EARTH_RADIUS_M }
    }

    pub fn refraction_coefficient(&self) -> f64 { self.refraction_coefficient }

    pub fn correction(&self, distance_m: f64) -> AtmosphericCorrection {
        let base = distance_m * distance_m / (2.0 * self.earth_radius_m);
        let curvature_m = base;
        let refraction_m = -self.refraction_coefficient * base;
        AtmosphericCorrection {
            distance_m,
            refraction_coefficient: self.refraction_coefficient,
            curvature_m,
            refraction_m,
            total_m: (1.0 - self.refraction_coefficient) * base,
        }
    }

    /// Corrects every observation of the line.
    ///
    /// Fails without touching the line if any observation lacks a distance: a
    /// partially corrected line would bias the adjustment.
    pub fn apply(&self, line: &mut LevelingLine) -> Result<()> {
        let missing: Vec<String> = line
            .observations
            .iter()
            .enumerate()
            .filter(|(_, o)| o.distance_m.is_none())
            .map(|(i, o)| format!("#{} {} -> {}", i, o.from, o.to))
            .collect();
        if !missing.is_empty() {
            return Err(LevelingError::Configuration(format!(
                "atmospheric correction requires a sighting distance on every observation; missing on {}",
                missing.join(", ")
            )));
        }
        require_derived(line)?;

        for obs in line.observations.iter_mut() {
            if let (Some(d), Some(dh)) = (obs.distance_m, obs.derived_dh_m) {
                let c = self.correction(d);
                obs.atmospheric_correction_m = Some(c.total_m);
                obs.corrected_dh_m = Some(dh + c.total_m);
            }
        }
        log::debug!(
            "Applied atmospheric corrections to {} observations (r = {:.4})",
            line.observations.len(),
            self.refraction_coefficient
        );
        Ok(())
    }
}

fn require_derived(line: &LevelingLine) -> Result<()> {
    match line.observations.iter().position(|o| o.derived_dh_m.is_none()) {
        Some(i) => Err(LevelingError::Structure(format!(
            "observation {} must be derived before it can be corrected", i
        ))),
        None => Ok(()),
    }
}

/// Runs the correction stage as configured. When disabled every correction is zero.
pub fn apply_corrections(line: &mut LevelingLine, settings: &AtmosphericSettings) -> Result<()> {
    if settings.enabled {
        return AtmosphericCorrector::new(&settings.conditions).apply(line);
    }
    require_derived(line)?;
    for obs in line.observations.iter_mut() {
        obs.atmospheric_correction_m = Some(0.0);
        obs.corrected_dh_m = obs.derived_dh_m;
    }
    Ok(())
}
