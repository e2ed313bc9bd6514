use super::{BandMatrix, SolverMethod};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Corrections to the free altitudes and their cofactor matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeastSquaresSolution {
    pub method: SolverMethod,
    /// `x̂` in millimetres, one entry per unknown.
    pub corrections_mm: DVector<f64>,
    /// Band of `Qx = (AᵀPA)⁻¹`, as wide as the band of `AᵀPA`.
    pub covariance: BandMatrix,
}

impl LeastSquaresSolution {
    pub fn empty(method: SolverMethod) -> Self {
        Self { method, corrections_mm: DVector::zeros(0), covariance: BandMatrix::zeros(0, 0) }
    }

    pub fn unknown_count(&self) -> usize { self.corrections_mm.len() }

    pub fn max_abs_correction_mm(&self) -> f64 {
        self.corrections_mm.iter().fold(0.0, |m, x| m.max(x.abs()))
    }
}
