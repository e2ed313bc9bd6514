//! Field computations: height differences, propagation, corrections and closure.
pub mod atmosphere;
pub mod closure;
pub mod height_difference;
pub mod propagation;

pub use atmosphere::{apply_corrections, AtmosphericConditions, AtmosphericCorrection, AtmosphericCorrector};
pub use closure::{tolerance_mm, ClosureAnalysis, ClosureAnalyzer};
pub use height_difference::{controlled_difference, HeightDifferenceCalculator};
pub use propagation::propagate;
