//! Weighted least-squares solvers for the network model.
//!
//! Two strategies share one trait. Small networks go through the normal
//! equations; from `solver_threshold` unknowns on, QR avoids squaring the
//! condition number. Both work on the band of `AᵀPA` only.
pub mod band;
pub mod normal;
pub mod qr;
pub mod solution;

pub use band::BandMatrix;
pub use normal::NormalEquations;
pub use qr::QrDecomposition;
pub use solution::LeastSquaresSolution;

use crate::error::Result;
use crate::network::NetworkModel;
use serde::{Deserialize, Serialize};

/// Relative pivot size below which a system is treated as singular.
pub(crate) const PIVOT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMethod {
    NormalEquations,
    QrDecomposition,
}

impl SolverMethod {
    pub fn strategy(self) -> &'static dyn SolveStrategy {
        match self {
            SolverMethod::NormalEquations => &NormalEquations,
            SolverMethod::QrDecomposition => &QrDecomposition,
        }
    }
}

pub trait SolveStrategy: Send + Sync {
    fn method(&self) -> SolverMethod;

    /// `x̂ = (AᵀPA)⁻¹AᵀPf` and `Qx = (AᵀPA)⁻¹`.
    fn solve(&self, model: &NetworkModel) -> Result<LeastSquaresSolution>;
}

/// Normal equations below `threshold` unknowns, QR from there on.
pub fn select_method(unknowns: usize, threshold: usize) -> SolverMethod {
    if unknowns < threshold {
        SolverMethod::NormalEquations
    } else {
        SolverMethod::QrDecomposition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LevelingError;
    use crate::network::{NetworkRow, RowOrigin};
    use crate::store::PointId;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn row(entries: &[(usize, f64)], misclosure_mm: f64, weight: f64) -> NetworkRow {
        NetworkRow {
            entries: entries.iter().copied().collect(),
            misclosure_mm,
            weight,
            origin: RowOrigin { observation: 0, instrument: None, from: "X".into(), to: "Y".into() },
        }
    }

    fn ids(names: &[&str]) -> Vec<PointId> {
        names.iter().map(|&s| s.into()).collect()
    }

    /// Loop A -> B -> C -> A with A fixed and a -3 mm misclosure on the closing leg.
    fn closed_loop() -> NetworkModel {
        NetworkModel::from_parts(
            ids(&["B", "C"]),
            vec![
                row(&[(0, 1.0)], 0.0, 0.8),
                row(&[(0, -1.0), (1, 1.0)], 0.0, 0.8),
                row(&[(1, -1.0)], -3.0, 0.5),
            ],
        ).unwrap()
    }

    #[rstest]
    #[case(999, 1000, SolverMethod::NormalEquations)]
    #[case(1000, 1000, SolverMethod::QrDecomposition)]
    #[case(5000, 1000, SolverMethod::QrDecomposition)]
    #[case(3, 1, SolverMethod::QrDecomposition)]
    fn test_select_method(#[case] unknowns: usize, #[case] threshold: usize, #[case] expected: SolverMethod) {
        assert_eq!(select_method(unknowns, threshold), expected);
    }

    #[rstest]
    #[case(SolverMethod::NormalEquations)]
    #[case(SolverMethod::QrDecomposition)]
    fn test_closed_loop_solution(#[case] method: SolverMethod) {
        let s = method.strategy().solve(&closed_loop()).unwrap();
        assert_eq!(s.method, method);
        assert_relative_eq!(s.corrections_mm[0], 5.0 / 6.0, epsilon = 1e-9);
        assert_relative_eq!(s.corrections_mm[1], 5.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(s.covariance.get(0, 0), 0.902_777_777_8, epsilon = 1e-9);
        assert_relative_eq!(s.covariance.get(1, 1), 10.0 / 9.0, epsilon = 1e-9);
        assert_relative_eq!(s.covariance.get(0, 1), s.covariance.get(1, 0), epsilon = 1e-12);
    }

    #[test]
    fn test_strategies_agree_on_a_longer_line() {
        // Open line of 30 legs with a drift on every row, both ends fixed.
        let n = 29;
        let mut rows = vec![row(&[(0, 1.0)], 0.7, 1.0)];
        for c in 1..n {
            rows.push(row(&[(c - 1, -1.0), (c, 1.0)], 0.1 * (c % 7) as f64 - 0.3, 1.0 / (1.0 + 0.01 * c as f64)));
        }
        rows.push(row(&[(n - 1, -1.0)], -1.2, 0.9));
        let names: Vec<PointId> = (0..n).map(|i| format!("P{}", i).into()).collect();
        let model = NetworkModel::from_parts(names, rows).unwrap();

        let a = NormalEquations.solve(&model).unwrap();
        let b = QrDecomposition.solve(&model).unwrap();
        for i in 0..n {
            assert_relative_eq!(a.corrections_mm[i], b.corrections_mm[i], epsilon = 1e-9);
            assert_relative_eq!(a.covariance.get(i, i), b.covariance.get(i, i), epsilon = 1e-9);
            if i > 0 {
                assert_relative_eq!(a.covariance.get(i, i - 1), b.covariance.get(i, i - 1), epsilon = 1e-9);
            }
        }
        assert_eq!(a.covariance.bandwidth(), 1);
    }

    #[test]
    fn test_zero_unknowns_give_empty_solution() {
        let model = NetworkModel::from_parts(vec![], vec![row(&[], 1.0, 1.0)]).unwrap();
        for method in [SolverMethod::NormalEquations, SolverMethod::QrDecomposition] {
            let s = method.strategy().solve(&model).unwrap();
            assert_eq!(s.unknown_count(), 0);
            assert_eq!(s.max_abs_correction_mm(), 0.0);
        }
    }

    #[rstest]
    #[case(SolverMethod::NormalEquations)]
    #[case(SolverMethod::QrDecomposition)]
    fn test_unobserved_unknown_is_singular(#[case] method: SolverMethod) {
        let model = NetworkModel::from_parts(
            ids(&["B", "C", "D"]),
            vec![row(&[(0, 1.0)], 0.0, 1.0), row(&[(0, -1.0), (1, 1.0)], 0.0, 1.0), row(&[(1, -1.0)], 0.0, 1.0)],
        ).unwrap();
        assert!(matches!(method.strategy().solve(&model), Err(LevelingError::SingularSystem(_))));
    }

    #[test]
    fn test_banded_covariance_matches_dense_inverse() {
        let model = closed_loop();
        let a = model.design_matrix();
        let dense = (a.transpose() * model.weight_matrix() * &a).try_inverse().unwrap();
        for method in [SolverMethod::NormalEquations, SolverMethod::QrDecomposition] {
            let s = method.strategy().solve(&model).unwrap();
            assert_relative_eq!(s.covariance.to_dense(), dense, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_qr_rejects_fewer_rows_than_unknowns() {
        let model = NetworkModel::from_parts(ids(&["B", "C"]), vec![row(&[(0, -1.0), (1, 1.0)], 0.0, 1.0)]).unwrap();
        match QrDecomposition.solve(&model).unwrap_err() {
            LevelingError::SingularSystem(msg) => assert!(msg.contains("rank deficient")),
            other => panic!("Wrong error type: {:?}", other),
        }
    }
}
