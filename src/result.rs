//! What a compensation run hands back to the caller.
use crate::analysis::{Blunder, PrecisionCertification, UnitWeightTest};
use crate::computation::ClosureAnalysis;
use crate::solver::{BandMatrix, SolverMethod};
use crate::store::{LevelingLine, PointId, PointRole};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedPoint {
    pub id: PointId,
    pub role: PointRole,
    pub provisional_altitude: f64,
    /// `None` for fixed points.
    pub correction_mm: Option<f64>,
    pub adjusted_altitude: f64,
    /// `None` for fixed points.
    pub std_dev_mm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationResult {
    pub method: SolverMethod,
    /// Free points, in column order.
    pub unknowns: Vec<PointId>,
    pub corrections_mm: Vec<f64>,
    /// Every point of the line, in line order.
    pub points: Vec<AdjustedPoint>,
    /// Band of `Qx`; entries outside it are not formed.
    pub covariance: BandMatrix,
    pub residuals_mm: Vec<f64>,
    pub sigma0: f64,
    pub degrees_of_freedom: usize,
    pub unit_weight_test: UnitWeightTest,
    pub normalized_residuals: Vec<f64>,
    pub blunders: Vec<Blunder>,
    pub max_std_dev_mm: f64,
    pub certification: PrecisionCertification,
}

impl CompensationResult {
    pub fn adjusted_altitude(&self, id: &str) -> Option<f64> {
        self.points.iter().find(|p| p.id.as_str() == id).map(|p| p.adjusted_altitude)
    }

    pub fn is_certified(&self) -> bool { self.certification.certified }
}

/// One run's adjusted line, its closure analysis and the adjustment result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationReport {
    pub line: LevelingLine,
    pub closure: ClosureAnalysis,
    pub result: CompensationResult,
}
