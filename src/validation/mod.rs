//! Range checks applied to raw readings before any computation.
pub mod rules;
pub mod validator;

pub use rules::readings::{validate_distance, validate_height_difference, validate_reading};
pub use validator::ReadingValidator;
