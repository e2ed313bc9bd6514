//! Precision certification of an adjusted network.
use super::statistics::StatisticalSummary;
use crate::computation::ClosureAnalysis;
use crate::solver::LeastSquaresSolution;
use serde::{Deserialize, Serialize};

/// Largest normalized residual a certified network may carry. Independent of
/// the confidence level used for blunder flagging.
pub const NORMALIZED_RESIDUAL_LIMIT: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionCertification {
    pub target_mm: f64,
    pub max_correction_mm: f64,
    pub closure_error_mm: f64,
    pub max_normalized_residual: f64,
    pub corrections_within: bool,
    pub closure_within: bool,
    pub residuals_within: bool,
    pub certified: bool,
}

pub fn certify(
    target_mm: f64,
    solution: &LeastSquaresSolution,
    closure: &ClosureAnalysis,
    statistics: &StatisticalSummary,
) -> PrecisionCertification {
    let max_correction_mm = solution.max_abs_correction_mm();
    let max_normalized_residual = statistics.max_abs_normalized_residual();

    let corrections_within = max_correction_mm <= target_mm;
    let closure_within = closure.within(target_mm);
    let residuals_within = max_normalized_residual <= NORMALIZED_RESIDUAL_LIMIT;
    let certified = corrections_within && closure_within && residuals_within;

    if certified {
        log::info!("Network certified at {:.2} mm", target_mm);
    } else {
        log::warn!(
            "Network not certified at {:.2} mm (corrections {}, closure {}, residuals {})",
            target_mm, corrections_within, closure_within, residuals_within
        );
    }

    PrecisionCertification {
        target_mm,
        max_correction_mm,
        closure_error_mm: closure.closure_error_mm,
        max_normalized_residual,
        corrections_within,
        closure_within,
        residuals_within,
        certified,
    }
}
