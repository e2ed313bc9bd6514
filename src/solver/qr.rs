//! Givens QR of the weighted design matrix `√P·A`, one row at a time.
//!
//! The normal matrix is never formed, which keeps the condition number at that
//! of `A` rather than its square on long lines. Rows are rotated in order of
//! their first column, so `R` never leaves the band of `AᵀPA`.
use super::{BandMatrix, LeastSquaresSolution, SolveStrategy, SolverMethod, PIVOT_TOLERANCE};
use crate::error::{LevelingError, Result};
use crate::network::{NetworkModel, NetworkRow};
use nalgebra::DVector;
use smallvec::SmallVec;

pub struct QrDecomposition;

/// Upper triangular `R`, stored as its transpose, and `Qᵀ·√P·f` truncated to `n`.
struct GivensFactor {
    r_transposed: BandMatrix,
    qtf: Vec<f64>,
    filled: Vec<bool>,
}

impl GivensFactor {
    fn new(n: usize, bandwidth: usize) -> Self {
        Self { r_transposed: BandMatrix::zeros(n, bandwidth), qtf: vec![0.0; n], filled: vec![false; n] }
    }

    /// Rotates one weighted row, whose first column is `lead`, into `R`.
    fn absorb(&mut self, lead: usize, row: &NetworkRow) {
        let last = (lead + self.r_transposed.bandwidth()).min(self.qtf.len() - 1);
        let s = row.weight.sqrt();
        let mut w: SmallVec<[f64; 4]> = SmallVec::from_elem(0.0, last - lead + 1);
        for &(j, a) in &row.entries {
            w[j - lead] += s * a;
        }
        let mut g = s * row.misclosure_mm;
        let r = &mut self.r_transposed;

        for k in lead..=last {
            let a = w[k - lead];
            if a == 0.0 {
                continue;
            }
            if !self.filled[k] {
                for j in k..=last {
                    r.set(j, k, w[j - lead]);
                }
                self.qtf[k] = g;
                self.filled[k] = true;
                return;
            }
            let h = r.lower(k, k).hypot(a);
            let (cs, sn) = (r.lower(k, k) / h, a / h);
            for j in k..=last {
                let (rj, wj) = (r.lower(j, k), w[j - lead]);
                r.set(j, k, cs * rj + sn * wj);
                w[j - lead] = cs * wj - sn * rj;
            }
            let z = self.qtf[k];
            self.qtf[k] = cs * z + sn * g;
            g = cs * g - sn * z;
        }
    }
}

impl SolveStrategy for QrDecomposition {
    fn method(&self) -> SolverMethod { SolverMethod::QrDecomposition }

    fn solve(&self, model: &NetworkModel) -> Result<LeastSquaresSolution> {
        let (m, n) = (model.observation_count(), model.unknown_count());
        if n == 0 {
            return Ok(LeastSquaresSolution::empty(self.method()));
        }
        if m < n {
            return Err(LevelingError::SingularSystem(format!(
                "rank deficient: {} rows for {} unknowns", m, n
            )));
        }

        let mut ordered: Vec<(usize, &NetworkRow)> = model
            .rows()
            .iter()
            .filter_map(|row| row.entries.iter().map(|e| e.0).min().map(|lead| (lead, row)))
            .collect();
        ordered.sort_by_key(|&(lead, _)| lead);

        let mut factor = GivensFactor::new(n, model.bandwidth());
        for (lead, row) in ordered {
            factor.absorb(lead, row);
        }

        let r = &factor.r_transposed;
        let max_pivot = r.diagonal().iter().fold(0.0, |m: f64, d| m.max(d.abs()));
        let tolerance = PIVOT_TOLERANCE.sqrt() * max_pivot;
        if let Some(k) = (0..n).find(|&k| !factor.filled[k] || !(r.lower(k, k).abs() > tolerance)) {
            return Err(LevelingError::SingularSystem(format!(
                "negligible pivot {:e} at unknown '{}'", r.lower(k, k).abs(), model.unknowns()[k]
            )));
        }

        let mut x = factor.qtf.clone();
        r.back_substitute_transposed(&mut x);

        Ok(LeastSquaresSolution {
            method: self.method(),
            corrections_mm: DVector::from_vec(x),
            covariance: r.selected_inverse(),
        })
    }
}
