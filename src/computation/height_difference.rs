//! Derives one controlled height difference per observation.
use super::propagation;
use crate::error::{LevelingError, Result};
use crate::store::{InstrumentControl, LevelingLine, Observation, ReadingPair};
use crate::validation::validate_height_difference;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Redundant instruments on one observation must agree within 5 mm.
pub const CONTROL_THRESHOLD_M: f64 = 0.005;
/// Absorbs representation noise when a spread sits exactly on the threshold.
const CONTROL_EPSILON_M: f64 = 1e-9;
/// Observations handed to a rayon job at once.
const MIN_BATCH: usize = 512;

/// Per-instrument differences, their mean, residuals and spread. No threshold applied.
pub fn controlled_difference(readings: &[ReadingPair]) -> InstrumentControl {
    let differences_m: SmallVec<[f64; 4]> = readings.iter().map(ReadingPair::height_difference).collect();

    let n = differences_m.len() as f64;
    let mean_m = differences_m.iter().sum::<f64>() / n;
    let residuals_m = differences_m.iter().map(|d| d - mean_m).collect();

    let (min, max) = differences_m
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)));

    InstrumentControl { differences_m, mean_m, residuals_m, spread_m: max - min }
}

pub struct HeightDifferenceCalculator;

impl HeightDifferenceCalculator {
    /// Controls and derives every observation, then propagates provisional altitudes.
    ///
    /// Derivation runs in parallel; the first failing observation in line order
    /// is reported, so a given input always fails the same way.
    pub fn derive(line: &mut LevelingLine) -> Result<()> {
        log::debug!("Deriving height differences for {} observations", line.observations.len());

        let controls: Vec<Result<InstrumentControl>> = line
            .observations
            .par_iter()
            .enumerate()
            .with_min_len(MIN_BATCH)
            .map(|(i, obs)| Self::derive_one(i, obs))
            .collect();
        let controls = controls.into_iter().collect::<Result<Vec<_>>>()?;

        for (obs, control) in line.observations.iter_mut().zip(controls) {
            obs.derived_dh_m = Some(control.mean_m);
            obs.control = Some(control);
            obs.atmospheric_correction_m = None;
            obs.corrected_dh_m = None;
        }

        propagation::assign_provisional_altitudes(line)
    }

    fn derive_one(index: usize, obs: &Observation) -> Result<InstrumentControl> {
        let control = controlled_difference(&obs.readings);

        if control.spread_m > CONTROL_THRESHOLD_M + CONTROL_EPSILON_M {
            return Err(LevelingError::Control {
                observation: index,
                from: obs.from.to_string(),
                to: obs.to.to_string(),
                spread_mm: control.spread_m * 1000.0,
                threshold_mm: CONTROL_THRESHOLD_M * 1000.0,
                differences_m: control.differences_m.to_vec(),
            });
        }

        validate_height_difference(control.mean_m, obs.from.as_str(), obs.to.as_str())?;
        Ok(control)
    }
}
