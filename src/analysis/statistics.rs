//! A posteriori statistics of an adjustment: σ₀, the unit-weight χ² test,
//! normalized residuals and blunder flags.
use crate::error::{LevelingError, Result};
use crate::network::{NetworkModel, RowOrigin};
use crate::solver::LeastSquaresSolution;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

/// Redundancy numbers below this fraction of `1/p` are treated as zero.
const NEGLIGIBLE_REDUNDANCY: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitWeightTest {
    /// `vᵀPv`.
    pub statistic: f64,
    /// χ²(r) quantile at the confidence level.
    pub critical_value: f64,
    pub degrees_of_freedom: usize,
    pub confidence_level: f64,
    pub passes: bool,
}

/// A row whose normalized residual exceeds the Student-t critical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blunder {
    pub row: usize,
    pub origin: RowOrigin,
    pub residual_mm: f64,
    pub normalized_residual: f64,
    pub critical_value: f64,
    /// `|r̂| / t`; above 1 by construction.
    pub significance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
    /// `v = A·x̂ - f` (mm), one per row.
    pub residuals_mm: Vec<f64>,
    pub weighted_sum_squares: f64,
    pub degrees_of_freedom: usize,
    /// A posteriori standard deviation of unit weight.
    pub sigma0: f64,
    pub unit_weight_test: UnitWeightTest,
    pub normalized_residuals: Vec<f64>,
    pub student_t_critical: f64,
    pub blunders: Vec<Blunder>,
    /// `σ₀·√Qx_jj` (mm), one per unknown.
    pub std_devs_mm: Vec<f64>,
}

impl StatisticalSummary {
    pub fn max_abs_normalized_residual(&self) -> f64 {
        self.normalized_residuals.iter().fold(0.0, |m, r| m.max(r.abs()))
    }

    pub fn max_std_dev_mm(&self) -> f64 {
        self.std_devs_mm.iter().fold(0.0, |m, s| m.max(*s))
    }
}

pub struct StatisticalValidator {
    confidence_level: f64,
}

impl StatisticalValidator {
    /// Fails unless `0 < confidence_level < 1`.
    pub fn new(confidence_level: f64) -> Result<Self> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(LevelingError::Configuration(format!(
                "confidence level must lie in (0, 1), got {}", confidence_level
            )));
        }
        Ok(Self { confidence_level })
    }

    pub fn validate(&self, model: &NetworkModel, solution: &LeastSquaresSolution) -> Result<StatisticalSummary> {
        let (m, n) = (model.observation_count(), model.unknown_count());
        if m <= n {
            return Err(LevelingError::InsufficientData { observations: m, unknowns: n });
        }
        let dof = m - n;
        let x = &solution.corrections_mm;
        let qx = &solution.covariance;

        let residuals_mm: Vec<f64> = model.rows().iter().map(|row| row.dot(x) - row.misclosure_mm).collect();
        let weighted_sum_squares: f64 = model
            .rows()
            .iter()
            .zip(&residuals_mm)
            .map(|(row, v)| row.weight * v * v)
            .sum();
        let sigma0 = (weighted_sum_squares / dof as f64).sqrt();

        let chi2 = ChiSquared::new(dof as f64).map_err(|e| LevelingError::Configuration(e.to_string()))?;
        let chi2_critical = chi2.inverse_cdf(self.confidence_level);
        let unit_weight_test = UnitWeightTest {
            statistic: weighted_sum_squares,
            critical_value: chi2_critical,
            degrees_of_freedom: dof,
            confidence_level: self.confidence_level,
            passes: weighted_sum_squares <= chi2_critical,
        };

        let normalized_residuals: Vec<f64> = model
            .rows()
            .iter()
            .zip(&residuals_mm)
            .map(|(row, &v)| {
                let cofactor = 1.0 / row.weight;
                let explained: f64 = row
                    .entries
                    .iter()
                    .flat_map(|&(j, aj)| row.entries.iter().map(move |&(k, ak)| aj * ak * qx.get(j, k)))
                    .sum();
                let qvv = cofactor - explained;
                if sigma0 == 0.0 || qvv <= NEGLIGIBLE_REDUNDANCY * cofactor {
                    0.0
                } else {
                    v / (sigma0 * qvv.sqrt())
                }
            })
            .collect();

        let alpha = 1.0 - self.confidence_level;
        let student = StudentsT::new(0.0, 1.0, dof as f64).map_err(|e| LevelingError::Configuration(e.to_string()))?;
        let student_t_critical = student.inverse_cdf(1.0 - alpha / 2.0);

        let blunders: Vec<Blunder> = normalized_residuals
            .iter()
            .enumerate()
            .filter(|(_, r)| r.abs() > student_t_critical)
            .map(|(i, &r)| Blunder {
                row: i,
                origin: model.rows()[i].origin.clone(),
                residual_mm: residuals_mm[i],
                normalized_residual: r,
                critical_value: student_t_critical,
                significance: r.abs() / student_t_critical,
            })
            .collect();

        let std_devs_mm = (0..n).map(|j| sigma0 * qx.get(j, j).max(0.0).sqrt()).collect();

        if !unit_weight_test.passes {
            log::warn!(
                "Unit-weight test failed: vᵀPv = {:.4} > χ²({}) = {:.4}",
                weighted_sum_squares, dof, chi2_critical
            );
        }
        for b in &blunders {
            log::warn!(
                "Possible blunder on {} -> {}: |r̂| = {:.3} > t = {:.3}",
                b.origin.from, b.origin.to, b.normalized_residual.abs(), b.critical_value
            );
        }

        Ok(StatisticalSummary {
            residuals_mm,
            weighted_sum_squares,
            degrees_of_freedom: dof,
            sigma0,
            unit_weight_test,
            normalized_residuals,
            student_t_critical,
            blunders,
            std_devs_mm,
        })
    }
}
