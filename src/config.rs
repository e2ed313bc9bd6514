//! Run configuration. One immutable value is handed to every run.
use crate::computation::atmosphere::AtmosphericConditions;
use crate::error::{LevelingError, Result};
use serde::{Deserialize, Serialize};

/// How observations are turned into adjustment rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObservationLayout {
    /// One row per observation carrying the controlled mean.
    #[default]
    Controlled,
    /// One row per instrument reading pair.
    PerInstrument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphericSettings {
    pub enabled: bool,
    pub conditions: AtmosphericConditions,
}

impl Default for AtmosphericSettings {
    fn default() -> Self {
        Self { enabled: false, conditions: AtmosphericConditions::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompensationConfig {
    /// Precision the adjusted network must certify against (mm).
    pub precision_target_mm: f64,
    /// `a` in `σ² = a² + b²·d²` (mm).
    pub instrumental_error_mm: f64,
    /// `b` in `σ² = a² + b²·d²` (mm/√km).
    pub kilometric_error_mm: f64,
    pub atmospheric: AtmosphericSettings,
    /// Confidence level of the χ² and Student-t tests.
    pub confidence_level: f64,
    /// Unknown count from which the QR strategy replaces normal equations.
    pub solver_threshold: usize,
    pub layout: ObservationLayout,
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            precision_target_mm: 2.0,
            instrumental_error_mm: 1.0,
            kilometric_error_mm: 1.0,
            atmospheric: AtmosphericSettings::default(),
            confidence_level: 0.95,
            solver_threshold: 1000,
            layout: ObservationLayout::Controlled,
        }
    }
}

impl CompensationConfig {
    pub fn new() -> Self { Self::default() }

    pub fn with_precision_target_mm(mut self, target: f64) -> Self {
        self.precision_target_mm = target;
        self
    }

    pub fn with_error_model(mut self, instrumental_mm: f64, kilometric_mm: f64) -> Self {
        self.instrumental_error_mm = instrumental_mm;
        self.kilometric_error_mm = kilometric_mm;
        self
    }

    pub fn with_atmospheric_correction(mut self, conditions: AtmosphericConditions) -> Self {
        self.atmospheric = AtmosphericSettings { enabled: true, conditions };
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_solver_threshold(mut self, unknowns: usize) -> Self {
        self.solver_threshold = unknowns;
        self
    }

    pub fn with_layout(mut self, layout: ObservationLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Rejects values no run could use.
    pub fn validate(&self) -> Result<()> {
        if !(self.precision_target_mm.is_finite() && self.precision_target_mm > 0.0) {
            return Err(LevelingError::Configuration(format!(
                "precision target must be positive, got {} mm", self.precision_target_mm
            )));
        }
        if !(self.instrumental_error_mm.is_finite() && self.instrumental_error_mm > 0.0) {
            return Err(LevelingError::Configuration(format!(
                "instrumental error must be positive, got {} mm", self.instrumental_error_mm
            )));
        }
        if !(self.kilometric_error_mm.is_finite() && self.kilometric_error_mm >= 0.0) {
            return Err(LevelingError::Configuration(format!(
                "kilometric error must be non-negative, got {} mm/√km", self.kilometric_error_mm
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(LevelingError::Configuration(format!(
                "confidence level must lie in (0, 1), got {}", self.confidence_level
            )));
        }
        if self.solver_threshold == 0 {
            return Err(LevelingError::Configuration("solver threshold must be at least 1".into()));
        }
        if self.atmospheric.enabled {
            self.atmospheric.conditions.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let c = CompensationConfig::default();
        assert_eq!(c.precision_target_mm, 2.0);
        assert_eq!(c.instrumental_error_mm, 1.0);
        assert_eq!(c.kilometric_error_mm, 1.0);
        assert_eq!(c.confidence_level, 0.95);
        assert_eq!(c.solver_threshold, 1000);
        assert!(!c.atmospheric.enabled);
        assert!(c.validate().is_ok());
    }

    #[rstest]
    #[case(CompensationConfig::new().with_precision_target_mm(0.0))]
    #[case(CompensationConfig::new().with_error_model(0.0, 1.0))]
    #[case(CompensationConfig::new().with_error_model(1.0, -0.5))]
    #[case(CompensationConfig::new().with_confidence_level(1.0))]
    #[case(CompensationConfig::new().with_confidence_level(0.0))]
    #[case(CompensationConfig::new().with_solver_threshold(0))]
    fn test_rejects_invalid_values(#[case] config: CompensationConfig) {
        assert!(matches!(config.validate(), Err(LevelingError::Configuration(_))));
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let c: CompensationConfig = serde_json::from_str(r#"{"precision_target_mm": 3.0, "layout": "PerInstrument"}"#).unwrap();
        assert_eq!(c.precision_target_mm, 3.0);
        assert_eq!(c.layout, ObservationLayout::PerInstrument);
        assert_eq!(c.confidence_level, 0.95);
        assert_eq!(c.atmospheric.conditions, AtmosphericConditions::default());
    }
}
