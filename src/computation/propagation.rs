//! Sequential altitude propagation along a line.
use crate::error::{LevelingError, Result};
use crate::store::LevelingLine;

/// Running altitudes `H[i] = H[i-1] + dh[i]`, starting at `initial`.
///
/// Returns `differences.len() + 1` values. The scan is strictly left to right so
/// published altitudes reproduce bit for bit.
pub fn propagate(initial: f64, differences: &[f64]) -> Vec<f64> {
    let mut altitudes = Vec::with_capacity(differences.len() + 1);
    let mut current = initial;
    altitudes.push(current);
    for &dh in differences {
        current += dh;
        altitudes.push(current);
    }
    altitudes
}

/// Writes each point's provisional altitude from the derived differences.
pub(crate) fn assign_provisional_altitudes(line: &mut LevelingLine) -> Result<()> {
    let differences = line
        .observations
        .iter()
        .enumerate()
        .map(|(i, o)| {
            o.derived_dh_m.ok_or_else(|| {
                LevelingError::Structure(format!("observation {} has no derived height difference", i))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let altitudes = propagate(line.initial_altitude, &differences);
    for (point, h) in line.points.iter_mut().zip(altitudes) {
        point.provisional_altitude = Some(h);
    }
    Ok(())
}
