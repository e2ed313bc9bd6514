//! Drives one compensation run through every stage in order.
use crate::analysis::{certify, StatisticalValidator};
use crate::computation::{apply_corrections, ClosureAnalyzer, HeightDifferenceCalculator};
use crate::config::CompensationConfig;
use crate::error::{LevelingError, Result};
use crate::network::{check_connectivity, NetworkModel};
use crate::result::{AdjustedPoint, CompensationReport, CompensationResult};
use crate::solver::{select_method, LeastSquaresSolution};
use crate::store::LevelingLine;
use crate::validation::ReadingValidator;

/// Holds only the validated configuration; a single compensator may serve
/// any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct LevelingCompensator {
    config: CompensationConfig,
}

impl LevelingCompensator {
    pub fn new(config: CompensationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CompensationConfig { &self.config }

    /// Validates, derives, corrects, closes, adjusts and certifies `line`.
    ///
    /// Advisory outcomes (closure tolerance, unit-weight test, blunders,
    /// certification) are reported in the result; only structural, physical
    /// and numerical failures abort the run.
    pub fn compensate(&self, mut line: LevelingLine) -> Result<CompensationReport> {
        log::debug!(
            "Compensating {} line with {} points",
            line.closure().label(),
            line.point_count()
        );

        ReadingValidator::new(&line).validate()?;
        HeightDifferenceCalculator::derive(&mut line)?;
        apply_corrections(&mut line, &self.config.atmospheric)?;
        let closure = ClosureAnalyzer::analyze(&line)?;

        let model = NetworkModel::build(&line, &self.config)?;
        check_connectivity(&model)?;
        let method = select_method(model.unknown_count(), self.config.solver_threshold);
        let solution = method.strategy().solve(&model)?;

        let statistics = StatisticalValidator::new(self.config.confidence_level)?.validate(&model, &solution)?;
        let points = Self::write_back(&mut line, &model, &solution, &statistics.residuals_mm, &statistics.std_devs_mm)?;
        let certification = certify(self.config.precision_target_mm, &solution, &closure, &statistics);

        log::info!(
            "Adjusted {} unknowns by {:?}: σ₀ = {:.4}, r = {}, certified = {}",
            model.unknown_count(),
            method,
            statistics.sigma0,
            statistics.degrees_of_freedom,
            certification.certified
        );

        let result = CompensationResult {
            method,
            unknowns: model.unknowns().to_vec(),
            corrections_mm: solution.corrections_mm.iter().copied().collect(),
            points,
            covariance: solution.covariance,
            max_std_dev_mm: statistics.max_std_dev_mm(),
            residuals_mm: statistics.residuals_mm,
            sigma0: statistics.sigma0,
            degrees_of_freedom: statistics.degrees_of_freedom,
            unit_weight_test: statistics.unit_weight_test,
            normalized_residuals: statistics.normalized_residuals,
            blunders: statistics.blunders,
            certification,
        };
        Ok(CompensationReport { line, closure, result })
    }

    /// Publishes adjusted altitudes on the points and weights and residuals on
    /// the observations.
    fn write_back(
        line: &mut LevelingLine,
        model: &NetworkModel,
        solution: &LeastSquaresSolution,
        residuals_mm: &[f64],
        std_devs_mm: &[f64],
    ) -> Result<Vec<AdjustedPoint>> {
        let mut adjusted = Vec::with_capacity(line.points.len());
        for (point, column) in line.points.iter_mut().zip(model.point_columns()) {
            let provisional = point.known_altitude.or(point.provisional_altitude).ok_or_else(|| {
                LevelingError::Structure(format!("point '{}' has no provisional altitude", point.id))
            })?;
            let correction_mm = column.map(|c| solution.corrections_mm[c]);
            let altitude = provisional + correction_mm.unwrap_or(0.0) / 1000.0;
            point.adjusted_altitude = Some(altitude);

            adjusted.push(AdjustedPoint {
                id: point.id.clone(),
                role: point.role,
                provisional_altitude: provisional,
                correction_mm,
                adjusted_altitude: altitude,
                std_dev_mm: column.map(|c| std_devs_mm[c]),
            });
        }

        for obs in line.observations.iter_mut() {
            obs.weight = None;
            obs.residuals_mm.clear();
        }
        for (row, &v) in model.rows().iter().zip(residuals_mm) {
            let obs = &mut line.observations[row.origin.observation];
            obs.weight = Some(row.weight);
            obs.residuals_mm.push(v);
        }
        Ok(adjusted)
    }
}
