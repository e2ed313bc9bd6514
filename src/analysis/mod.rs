//! Post-adjustment statistics and certification.
pub mod certification;
pub mod statistics;

pub use certification::{certify, PrecisionCertification, NORMALIZED_RESIDUAL_LIMIT};
pub use statistics::{Blunder, StatisticalSummary, StatisticalValidator, UnitWeightTest};
