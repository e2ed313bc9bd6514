//! Error taxonomy for a compensation run.
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LevelingError>;

/// The physical quantity a range check was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Reading,
    HeightDifference,
    Distance,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Reading => write!(f, "Rod reading"),
            Quantity::HeightDifference => write!(f, "Height difference"),
            Quantity::Distance => write!(f, "Sighting distance"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LevelingError {
    /// A raw or derived value lies outside its plausible physical range.
    #[error("{quantity} of {value} m at '{location}' is outside [{min}, {max}] m")]
    Validation { quantity: Quantity, location: String, value: f64, min: f64, max: f64 },

    /// Redundant instruments disagree on one observation by more than the control threshold.
    #[error("Instrument control failed on observation {observation} ('{from}' -> '{to}'): spread {spread_mm:.2} mm exceeds {threshold_mm:.2} mm")]
    Control {
        observation: usize,
        from: String,
        to: String,
        spread_mm: f64,
        threshold_mm: f64,
        differences_m: Vec<f64>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Singular system: {0}")]
    SingularSystem(String),

    #[error("Insufficient data: {observations} observations for {unknowns} unknowns leaves no redundancy")]
    InsufficientData { observations: usize, unknowns: usize },

    /// The leveling line itself is malformed.
    #[error("Malformed leveling line: {0}")]
    Structure(String),
}
