//! Normal equations `N·x = u` with `N = AᵀPA`, `u = AᵀPf`, factored by a
//! banded Cholesky.
use super::{BandMatrix, LeastSquaresSolution, SolveStrategy, SolverMethod, PIVOT_TOLERANCE};
use crate::error::{LevelingError, Result};
use crate::network::NetworkModel;
use nalgebra::DVector;

pub struct NormalEquations;

impl NormalEquations {
    /// Accumulates the band of `N` and the vector `u` straight from the sparse rows.
    pub fn assemble(model: &NetworkModel) -> (BandMatrix, Vec<f64>) {
        let n = model.unknown_count();
        let mut normal = BandMatrix::zeros(n, model.bandwidth());
        let mut rhs = vec![0.0; n];

        for row in model.rows() {
            let p = row.weight;
            for &(i, ai) in &row.entries {
                rhs[i] += ai * p * row.misclosure_mm;
                for &(j, aj) in row.entries.iter().filter(|&&(j, _)| j <= i) {
                    normal.add_symmetric(i, j, ai * p * aj);
                }
            }
        }
        (normal, rhs)
    }
}

impl SolveStrategy for NormalEquations {
    fn method(&self) -> SolverMethod { SolverMethod::NormalEquations }

    fn solve(&self, model: &NetworkModel) -> Result<LeastSquaresSolution> {
        if model.unknown_count() == 0 {
            return Ok(LeastSquaresSolution::empty(self.method()));
        }

        let (normal, mut x) = Self::assemble(model);
        let factor = normal.cholesky(PIVOT_TOLERANCE).map_err(|k| {
            LevelingError::SingularSystem(format!(
                "negligible pivot {:e} at unknown '{}'", normal.get(k, k), model.unknowns()[k]
            ))
        })?;

        factor.forward_substitute(&mut x);
        factor.back_substitute_transposed(&mut x);

        Ok(LeastSquaresSolution {
            method: self.method(),
            corrections_mm: DVector::from_vec(x),
            covariance: factor.selected_inverse(),
        })
    }
}
