//! Physical plausibility rules for rod readings and derived values.

use crate::error::{LevelingError, Quantity, Result};

/// A rod reading beyond ±10 m is not a reading off a leveling staff.
pub const READING_LIMIT_M: f64 = 10.0;
/// A single set-up cannot span more than ±50 m of relief.
pub const HEIGHT_DIFFERENCE_LIMIT_M: f64 = 50.0;

fn check_range(quantity: Quantity, location: String, value: f64, min: f64, max: f64) -> Result<()> {
    // NaN fails both comparisons and is rejected with the same error.
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(LevelingError::Validation { quantity, location, value, min, max })
    }
}

/// Backsight or foresight reading taken on `point`, in metres.
pub fn validate_reading(value: f64, point: &str) -> Result<()> {
    check_range(Quantity::Reading, point.to_string(), value, -READING_LIMIT_M, READING_LIMIT_M)
}

/// Height difference derived between `from` and `to`, in metres.
pub fn validate_height_difference(dh: f64, from: &str, to: &str) -> Result<()> {
    check_range(
        Quantity::HeightDifference,
        format!("{} -> {}", from, to),
        dh,
        -HEIGHT_DIFFERENCE_LIMIT_M,
        HEIGHT_DIFFERENCE_LIMIT_M,
    )
}

/// Sighting distance between `from` and `to`, in metres.
pub fn validate_distance(distance_m: f64, from: &str, to: &str) -> Result<()> {
    check_range(Quantity::Distance, format!("{} -> {}", from, to), distance_m, 0.0, f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, true)]
    #[case(1.2345, true)]
    #[case(10.0, true)]
    #[case(-10.0, true)]
    #[case(10.0001, false)]
    #[case(-12.0, false)]
    #[case(f64::NAN, false)]
    #[case(f64::INFINITY, false)]
    fn test_reading_range(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(validate_reading(value, "P1").is_ok(), ok);
    }

    #[rstest]
    #[case(49.9, true)]
    #[case(-50.0, true)]
    #[case(50.5, false)]
    #[case(-51.0, false)]
    fn test_height_difference_range(#[case] dh: f64, #[case] ok: bool) {
        assert_eq!(validate_height_difference(dh, "A", "B").is_ok(), ok);
    }

    #[test]
    fn test_error_names_the_point() {
        let err = validate_reading(11.0, "R12").unwrap_err();
        match err {
            LevelingError::Validation { quantity, location, value, .. } => {
                assert_eq!(quantity, Quantity::Reading);
                assert_eq!(location, "R12");
                assert_eq!(value, 11.0);
            }
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[test]
    fn test_distance_must_be_non_negative() {
        assert!(validate_distance(0.0, "A", "B").is_ok());
        assert!(validate_distance(120.0, "A", "B").is_ok());
        assert!(validate_distance(-1.0, "A", "B").is_err());
        assert!(validate_distance(f64::NAN, "A", "B").is_err());
    }
}
