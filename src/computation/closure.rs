//! Closure analysis: how far the line misses its known reference.
use super::propagation::propagate;
use crate::error::{LevelingError, Result};
use crate::store::{ClosureKind, LevelingLine};
use serde::{Deserialize, Serialize};

/// Tolerance factor of `T = 4·√K` mm.
pub const TOLERANCE_FACTOR_MM: f64 = 4.0;

/// Allowed closure error (mm) for a line of `length_km` kilometres.
pub fn tolerance_mm(length_km: f64) -> f64 {
    TOLERANCE_FACTOR_MM * length_km.max(0.0).sqrt()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureAnalysis {
    pub kind: ClosureKind,
    /// Initial altitude plus every effective height difference (m).
    pub computed_final_altitude: f64,
    /// Altitude the line should have reached; `None` when unconstrained.
    pub reference_altitude: Option<f64>,
    pub closure_error_m: f64,
    pub closure_error_mm: f64,
    pub tolerance_mm: f64,
    pub total_length_km: f64,
    pub passes: bool,
    /// `|closure_error_mm| / tolerance_mm`; 0 when the tolerance vanishes.
    pub precision_ratio: f64,
}

impl ClosureAnalysis {
    pub fn evaluate(
        kind: ClosureKind,
        computed_final_altitude: f64,
        reference_altitude: Option<f64>,
        total_length_km: f64,
    ) -> Self {
        let closure_error_m = reference_altitude.map_or(0.0, |h| computed_final_altitude - h);
        let closure_error_mm = closure_error_m * 1000.0;
        let tolerance_mm = tolerance_mm(total_length_km);
        let precision_ratio = if tolerance_mm > 0.0 { closure_error_mm.abs() / tolerance_mm } else { 0.0 };

        Self {
            kind,
            computed_final_altitude,
            reference_altitude,
            closure_error_m,
            closure_error_mm,
            tolerance_mm,
            total_length_km,
            passes: closure_error_mm.abs() <= tolerance_mm,
            precision_ratio,
        }
    }

    /// Whether the closure error also meets a stricter precision target.
    pub fn within(&self, target_mm: f64) -> bool {
        self.closure_error_mm.abs() <= target_mm
    }
}

pub struct ClosureAnalyzer;

impl ClosureAnalyzer {
    /// Advisory only: a failing closure is reported, never raised.
    pub fn analyze(line: &LevelingLine) -> Result<ClosureAnalysis> {
        let differences = line
            .observations()
            .iter()
            .enumerate()
            .map(|(i, o)| {
                o.effective_dh_m().ok_or_else(|| {
                    LevelingError::Structure(format!("observation {} has no height difference to close on", i))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let computed = propagate(line.initial_altitude(), &differences);
        let computed_final = computed.last().copied().unwrap_or(line.initial_altitude());

        let reference = match line.closure() {
            ClosureKind::Closed => line.first_point().known_altitude,
            ClosureKind::Open { known_final_altitude } => Some(known_final_altitude),
            ClosureKind::Unconstrained => None,
        };

        let analysis = ClosureAnalysis::evaluate(line.closure(), computed_final, reference, line.total_length_km());
        if analysis.passes {
            log::debug!(
                "Closure {:.3} mm within tolerance {:.3} mm",
                analysis.closure_error_mm, analysis.tolerance_mm
            );
        } else {
            log::warn!(
                "Closure {:.3} mm exceeds tolerance {:.3} mm over {:.3} km",
                analysis.closure_error_mm, analysis.tolerance_mm, analysis.total_length_km
            );
        }
        Ok(analysis)
    }
}
