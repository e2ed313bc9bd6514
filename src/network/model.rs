//! The adjustment model `A·x ≈ f` with diagonal weights `P`.
//!
//! Unknowns are millimetre corrections to the provisional altitudes of free
//! points. Fixed points carry no column, so an observation touching one
//! contributes a single entry to its row.
use crate::config::{CompensationConfig, ObservationLayout};
use crate::error::{LevelingError, Result};
use crate::store::{LevelingLine, Observation, PointId};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Sparse design-matrix row: `(column, coefficient)` pairs.
pub type RowEntries = SmallVec<[(usize, f64); 2]>;

/// Sighting distance weighted for observations with no usable distance.
pub const DEFAULT_WEIGHT_DISTANCE_M: f64 = 10.0;

/// Distance (km) entering the weight of `obs`.
pub fn weighting_distance_km(obs: &Observation) -> f64 {
    match obs.distance_m {
        Some(d) if d > 0.0 => d / 1000.0,
        _ => DEFAULT_WEIGHT_DISTANCE_M / 1000.0,
    }
}

/// `p = 1 / (a² + b²·d²)` in mm⁻², with `d` in km.
pub fn observation_weight(distance_km: f64, instrumental_mm: f64, kilometric_mm: f64) -> f64 {
    let variance = instrumental_mm.powi(2) + kilometric_mm.powi(2) * distance_km.powi(2);
    1.0 / variance
}

/// Where a row came from in the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOrigin {
    pub observation: usize,
    /// Instrument index when rows are laid out per instrument.
    pub instrument: Option<usize>,
    pub from: PointId,
    pub to: PointId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRow {
    pub entries: RowEntries,
    /// Observed minus provisional height difference (mm).
    pub misclosure_mm: f64,
    pub weight: f64,
    pub origin: RowOrigin,
}

impl NetworkRow {
    /// `aᵢᵀ·x` for this row.
    #[inline]
    pub fn dot(&self, x: &DVector<f64>) -> f64 {
        self.entries.iter().map(|&(c, a)| a * x[c]).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkModel {
    rows: Vec<NetworkRow>,
    unknowns: Vec<PointId>,
    /// Column of each line point, `None` for fixed points.
    point_columns: Vec<Option<usize>>,
}

impl NetworkModel {
    /// Assembles a model directly. Every column index must address an unknown
    /// and every weight must be positive.
    pub fn from_parts(unknowns: Vec<PointId>, rows: Vec<NetworkRow>) -> Result<Self> {
        let n = unknowns.len();
        for (i, row) in rows.iter().enumerate() {
            if let Some(&(c, _)) = row.entries.iter().find(|(c, _)| *c >= n) {
                return Err(LevelingError::Structure(format!(
                    "row {} references column {} of a model with {} unknowns", i, c, n
                )));
            }
            if !(row.weight.is_finite() && row.weight > 0.0) {
                return Err(LevelingError::Configuration(format!(
                    "row {} has non-positive weight {}", i, row.weight
                )));
            }
        }
        Ok(Self { rows, unknowns, point_columns: Vec::new() })
    }

    /// Builds the model of a derived (and optionally corrected) line.
    pub fn build(line: &LevelingLine, config: &CompensationConfig) -> Result<Self> {
        let mut unknowns = Vec::new();
        let mut point_columns = Vec::with_capacity(line.point_count());
        let mut reference_altitudes = Vec::with_capacity(line.point_count());

        for point in line.points() {
            if point.is_fixed() {
                point_columns.push(None);
            } else {
                point_columns.push(Some(unknowns.len()));
                unknowns.push(point.id.clone());
            }
            let h0 = point.known_altitude.or(point.provisional_altitude).ok_or_else(|| {
                LevelingError::Structure(format!("point '{}' has no provisional altitude", point.id))
            })?;
            reference_altitudes.push(h0);
        }

        let mut rows = Vec::with_capacity(line.observations().len());
        for (i, obs) in line.observations().iter().enumerate() {
            let (p, q) = (i, i + 1);
            let mut entries = RowEntries::new();
            if let Some(c) = point_columns[p] {
                entries.push((c, -1.0));
            }
            if let Some(c) = point_columns[q] {
                entries.push((c, 1.0));
            }

            let weight = observation_weight(
                weighting_distance_km(obs),
                config.instrumental_error_mm,
                config.kilometric_error_mm,
            );
            let provisional_dh = reference_altitudes[q] - reference_altitudes[p];
            let row = |dh: f64, instrument: Option<usize>| NetworkRow {
                entries: entries.clone(),
                misclosure_mm: (dh - provisional_dh) * 1000.0,
                weight,
                origin: RowOrigin { observation: i, instrument, from: obs.from.clone(), to: obs.to.clone() },
            };

            match config.layout {
                ObservationLayout::Controlled => {
                    let dh = obs.effective_dh_m().ok_or_else(|| {
                        LevelingError::Structure(format!("observation {} has no height difference", i))
                    })?;
                    rows.push(row(dh, None));
                }
                ObservationLayout::PerInstrument => {
                    let control = obs.control.as_ref().ok_or_else(|| {
                        LevelingError::Structure(format!("observation {} has no instrument control", i))
                    })?;
                    let correction = obs.atmospheric_correction_m.unwrap_or(0.0);
                    for (k, d) in control.differences_m.iter().enumerate() {
                        rows.push(row(d + correction, Some(k)));
                    }
                }
            }
        }

        log::debug!(
            "Network model: {} rows, {} unknowns ({:?} layout)",
            rows.len(), unknowns.len(), config.layout
        );
        Ok(Self { rows, unknowns, point_columns })
    }

    // --- Accessors ---
    pub fn rows(&self) -> &[NetworkRow] { &self.rows }
    pub fn unknowns(&self) -> &[PointId] { &self.unknowns }
    pub fn observation_count(&self) -> usize { self.rows.len() }
    pub fn unknown_count(&self) -> usize { self.unknowns.len() }
    pub fn point_columns(&self) -> &[Option<usize>] { &self.point_columns }

    /// Widest column span of any row; the bandwidth of `AᵀPA`.
    pub fn bandwidth(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| {
                let lo = r.entries.iter().map(|e| e.0).min()?;
                let hi = r.entries.iter().map(|e| e.0).max()?;
                Some(hi - lo)
            })
            .max()
            .unwrap_or(0)
    }

    /// `r = m - n`; may be zero or negative.
    pub fn degrees_of_freedom(&self) -> i64 {
        self.rows.len() as i64 - self.unknowns.len() as i64
    }

    pub fn design_matrix(&self) -> DMatrix<f64> {
        let mut a = DMatrix::zeros(self.rows.len(), self.unknowns.len());
        for (i, row) in self.rows.iter().enumerate() {
            for &(c, v) in &row.entries {
                a[(i, c)] += v;
            }
        }
        a
    }

    pub fn weight_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.weights())
    }

    pub fn weights(&self) -> DVector<f64> {
        DVector::from_iterator(self.rows.len(), self.rows.iter().map(|r| r.weight))
    }

    pub fn misclosures(&self) -> DVector<f64> {
        DVector::from_iterator(self.rows.len(), self.rows.iter().map(|r| r.misclosure_mm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computation::HeightDifferenceCalculator;
    use crate::store::{ClosureKind, Observation, ReadingPair};
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(1.0, 0.5)]
    #[case(0.5, 0.8)]
    fn test_default_weight_model(#[case] km: f64, #[case] expected: f64) {
        assert_relative_eq!(observation_weight(km, 1.0, 1.0), expected, epsilon = 1e-12);
    }

    fn derived(ids: &[&str], closure: ClosureKind, obs: Vec<Observation>) -> LevelingLine {
        let mut line = LevelingLine::new(ids.iter().copied(), 100.0, closure, obs).unwrap();
        HeightDifferenceCalculator::derive(&mut line).unwrap();
        line
    }

    #[test]
    fn test_simple_chain_is_bidiagonal() {
        let ids = ["A", "B", "C", "D"];
        let obs = ids.windows(2).map(|w| Observation::single(w[0], w[1], 1.3, 1.1, Some(100.0))).collect();
        let line = derived(&ids, ClosureKind::Unconstrained, obs);
        let model = NetworkModel::build(&line, &CompensationConfig::default()).unwrap();

        let expected = DMatrix::from_row_slice(3, 3, &[
            1.0, 0.0, 0.0,
            -1.0, 1.0, 0.0,
            0.0, -1.0, 1.0,
        ]);
        assert_eq!(model.design_matrix(), expected);
        assert_eq!(model.unknowns().len(), 3);
        assert_eq!(model.degrees_of_freedom(), 0);
        // Provisional altitudes reproduce the observations exactly.
        assert!(model.misclosures().iter().all(|f| f.abs() < 1e-9));
    }

    #[test]
    fn test_closed_loop_closes_on_fixed_point() {
        let obs = vec![
            Observation::single("A", "B", 2.000, 1.000, Some(500.0)),
            Observation::single("B", "C", 1.500, 1.000, Some(500.0)),
            Observation::single("C", "A", 1.000, 2.503, Some(1000.0)),
        ];
        let line = derived(&["A", "B", "C", "A"], ClosureKind::Closed, obs);
        let model = NetworkModel::build(&line, &CompensationConfig::default()).unwrap();

        assert_eq!(model.point_columns(), &[None, Some(0), Some(1), None]);
        let expected = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, -1.0, 1.0, 0.0, -1.0]);
        assert_eq!(model.design_matrix(), expected);
        assert_eq!(model.degrees_of_freedom(), 1);

        let f = model.misclosures();
        assert_relative_eq!(f[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(f[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(f[2], -3.0, epsilon = 1e-9);

        let w = model.weights();
        assert_relative_eq!(w[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(w[2], 0.5, epsilon = 1e-12);
        assert_eq!(model.weight_matrix()[(1, 1)], w[1]);
    }

    #[test]
    fn test_per_instrument_layout_expands_rows() {
        let obs = vec![
            Observation::new("A", "B", [ReadingPair::new(2.000, 1.000), ReadingPair::new(2.002, 1.000)], Some(100.0)),
            Observation::single("B", "C", 1.5, 1.0, Some(100.0)),
        ];
        let line = derived(&["A", "B", "C"], ClosureKind::Unconstrained, obs);
        let config = CompensationConfig::new().with_layout(ObservationLayout::PerInstrument);
        let model = NetworkModel::build(&line, &config).unwrap();

        assert_eq!(model.observation_count(), 3);
        assert_eq!(model.rows()[1].origin.instrument, Some(1));
        assert_eq!(model.rows()[2].origin.observation, 1);
        // Provisional B sits on the mean, so the two instruments straddle it.
        assert_relative_eq!(model.rows()[0].misclosure_mm, -1.0, epsilon = 1e-9);
        assert_relative_eq!(model.rows()[1].misclosure_mm, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_or_zero_distance_weighs_as_ten_metres() {
        let obs = vec![
            Observation::single("A", "B", 1.5, 1.0, None),
            Observation::single("B", "C", 1.5, 1.0, Some(0.0)),
            Observation::single("C", "D", 1.5, 1.0, Some(200.0)),
        ];
        let line = derived(&["A", "B", "C", "D"], ClosureKind::Unconstrained, obs);
        let w = NetworkModel::build(&line, &CompensationConfig::default()).unwrap().weights();

        assert_relative_eq!(w[0], 1.0 / 1.0001, epsilon = 1e-12);
        assert_relative_eq!(w[1], 1.0 / 1.0001, epsilon = 1e-12);
        assert_relative_eq!(w[2], 1.0 / 1.04, epsilon = 1e-12);
    }

    #[test]
    fn test_build_requires_propagated_altitudes() {
        let obs = vec![Observation::single("A", "B", 1.5, 1.0, None)];
        let line = LevelingLine::new(["A", "B"], 100.0, ClosureKind::Unconstrained, obs).unwrap();
        assert!(matches!(
            NetworkModel::build(&line, &CompensationConfig::default()),
            Err(LevelingError::Structure(_))
        ));
    }

    #[test]
    fn test_from_parts_rejects_out_of_range_column() {
        let row = NetworkRow {
            entries: smallvec::smallvec![(2, 1.0)],
            misclosure_mm: 0.0,
            weight: 1.0,
            origin: RowOrigin { observation: 0, instrument: None, from: "A".into(), to: "B".into() },
        };
        assert!(NetworkModel::from_parts(vec!["B".into(), "C".into()], vec![row]).is_err());
    }
}
