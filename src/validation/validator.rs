//! Applies the reading rules to every observation of a line.
use super::rules::readings;
use crate::error::Result;
use crate::store::LevelingLine;

/// Walks a line in order and stops at the first implausible value.
///
/// Backsights are attributed to the observation's from-point and foresights to
/// its to-point, matching how the rod was held in the field.
pub struct ReadingValidator<'a> {
    line: &'a LevelingLine,
}

impl<'a> ReadingValidator<'a> {
    pub fn new(line: &'a LevelingLine) -> Self {
        Self { line }
    }

    pub fn validate(&self) -> Result<()> {
        for obs in self.line.observations() {
            for pair in &obs.readings {
                readings::validate_reading(pair.backsight, obs.from.as_str())?;
                readings::validate_reading(pair.foresight, obs.to.as_str())?;
            }
            if let Some(d) = obs.distance_m {
                readings::validate_distance(d, obs.from.as_str(), obs.to.as_str())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LevelingError, Quantity};
    use crate::store::{ClosureKind, Observation, ReadingPair};

    #[test]
    fn test_first_violation_wins() {
        let obs = vec![
            Observation::single("A", "B", 1.2, 1.1, Some(50.0)),
            Observation::new("B", "C", [ReadingPair::new(1.0, 0.9), ReadingPair::new(1.0, 10.5)], Some(50.0)),
            Observation::single("C", "D", 11.0, 1.0, Some(50.0)),
        ];
        let line = LevelingLine::new(["A", "B", "C", "D"], 100.0, ClosureKind::Unconstrained, obs).unwrap();

        let err = ReadingValidator::new(&line).validate().unwrap_err();
        match err {
            LevelingError::Validation { quantity, location, value, .. } => {
                assert_eq!(quantity, Quantity::Reading);
                assert_eq!(location, "C");
                assert_eq!(value, 10.5);
            }
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[test]
    fn test_negative_distance_rejected() {
        let obs = vec![Observation::single("A", "B", 1.2, 1.1, Some(-5.0))];
        let line = LevelingLine::new(["A", "B"], 0.0, ClosureKind::Unconstrained, obs).unwrap();
        assert!(matches!(
            ReadingValidator::new(&line).validate(),
            Err(LevelingError::Validation { quantity: Quantity::Distance, .. })
        ));
    }

    #[test]
    fn test_valid_line_passes() {
        let obs = vec![Observation::single("A", "B", 1.2, 1.1, None)];
        let line = LevelingLine::new(["A", "B"], 0.0, ClosureKind::Unconstrained, obs).unwrap();
        assert!(ReadingValidator::new(&line).validate().is_ok());
    }
}
