//! One-dimensional geodetic leveling compensation.
//!
//! A [`LevelingLine`] of rod readings goes through reading validation,
//! controlled height-difference derivation, optional curvature and refraction
//! correction, closure analysis and a weighted least-squares adjustment whose
//! statistics certify the network against a precision target.

pub mod analysis;
pub mod compensator;
pub mod computation;
pub mod config;
pub mod display;
pub mod error;
pub mod network;
pub mod result;
pub mod solver;
pub mod store;
pub mod validation;

pub use compensator::LevelingCompensator;
pub use computation::{AtmosphericConditions, ClosureAnalysis};
pub use config::{CompensationConfig, ObservationLayout};
pub use error::{LevelingError, Result};
pub use result::{AdjustedPoint, CompensationReport, CompensationResult};
pub use solver::SolverMethod;
pub use store::{ClosureKind, LevelingLine, Observation, PointId, ReadingPair};

/// Runs one compensation with `config`.
pub fn compensate(line: LevelingLine, config: CompensationConfig) -> Result<CompensationReport> {
    LevelingCompensator::new(config)?.compensate(line)
}
