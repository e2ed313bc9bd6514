use super::types::*;
use crate::error::{LevelingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered leveling line: points and the observations joining consecutive points.
///
/// Deserialization runs the same structural checks as [`LevelingLine::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LineRecord")]
pub struct LevelingLine {
    pub(crate) points: Vec<Point>,
    pub(crate) observations: Vec<Observation>,
    pub(crate) closure: ClosureKind,
    pub(crate) initial_altitude: f64,
}

/// Serialized form of a line, checked before it becomes a [`LevelingLine`].
#[derive(Deserialize)]
struct LineRecord {
    points: Vec<Point>,
    observations: Vec<Observation>,
    closure: ClosureKind,
    initial_altitude: f64,
}

impl TryFrom<LineRecord> for LevelingLine {
    type Error = LevelingError;

    /// Roles and known altitudes are rebuilt from the closure; computed
    /// altitudes are carried over.
    fn try_from(record: LineRecord) -> Result<Self> {
        let ids: Vec<PointId> = record.points.iter().map(|p| p.id.clone()).collect();
        let mut line = Self::new(ids, record.initial_altitude, record.closure, record.observations)?;
        for (point, stored) in line.points.iter_mut().zip(record.points) {
            point.provisional_altitude = stored.provisional_altitude;
            point.adjusted_altitude = stored.adjusted_altitude;
        }
        Ok(line)
    }
}

impl LevelingLine {
    /// Builds a line from its point sequence and the observations linking them.
    ///
    /// Observation `i` must link point `i` to point `i + 1`. A closed line repeats
    /// the first point id at the end; any other repetition is rejected.
    pub fn new<I, P>(
        point_ids: I,
        initial_altitude: f64,
        closure: ClosureKind,
        observations: Vec<Observation>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PointId>,
    {
        let ids: Vec<PointId> = point_ids.into_iter().map(Into::into).collect();

        if ids.is_empty() {
            return Err(LevelingError::Structure("a line needs at least one point".into()));
        }
        if !initial_altitude.is_finite() {
            return Err(LevelingError::Structure(format!("initial altitude {} is not finite", initial_altitude)));
        }
        if observations.len() != ids.len() - 1 {
            return Err(LevelingError::Structure(format!(
                "{} points require {} observations, got {}",
                ids.len(), ids.len() - 1, observations.len()
            )));
        }

        Self::check_closure(&ids, &closure)?;
        Self::check_links(&ids, &observations)?;

        let last = ids.len() - 1;
        let points = ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                let known_altitude = match (index, &closure) {
                    (0, _) => Some(initial_altitude),
                    (i, ClosureKind::Closed) if i == last => Some(initial_altitude),
                    (i, ClosureKind::Open { known_final_altitude }) if i == last => Some(*known_final_altitude),
                    _ => None,
                };
                Point {
                    id,
                    index,
                    role: if known_altitude.is_some() { PointRole::Fixed } else { PointRole::Free },
                    known_altitude,
                    provisional_altitude: None,
                    adjusted_altitude: None,
                }
            })
            .collect();

        Ok(Self { points, observations, closure, initial_altitude })
    }

    fn check_closure(ids: &[PointId], closure: &ClosureKind) -> Result<()> {
        let first = &ids[0];
        let last = &ids[ids.len() - 1];
        match closure {
            ClosureKind::Closed if first != last => Err(LevelingError::Structure(format!(
                "closed line must end on its first point '{}', ends on '{}'", first, last
            ))),
            ClosureKind::Open { known_final_altitude } => {
                if ids.len() < 2 || first == last {
                    return Err(LevelingError::Structure("open line must end on a distinct point".into()));
                }
                if !known_final_altitude.is_finite() {
                    return Err(LevelingError::Structure(format!(
                        "known final altitude {} is not finite", known_final_altitude
                    )));
                }
                Ok(())
            }
            ClosureKind::Unconstrained if ids.len() > 1 && first == last => Err(LevelingError::Structure(
                "a line returning to its first point must be declared closed".into(),
            )),
            _ => Ok(()),
        }
        .and_then(|_| {
            // Only the closing repetition of the first point may reuse an id.
            let body = if ids.len() > 1 && first == last { &ids[..ids.len() - 1] } else { ids };
            let mut seen = HashSet::with_capacity(body.len());
            for id in body {
                if !seen.insert(id) {
                    return Err(LevelingError::Structure(format!("duplicate point id '{}'", id)));
                }
            }
            Ok(())
        })
    }

    fn check_links(ids: &[PointId], observations: &[Observation]) -> Result<()> {
        for (i, obs) in observations.iter().enumerate() {
            if obs.from != ids[i] || obs.to != ids[i + 1] {
                return Err(LevelingError::Structure(format!(
                    "observation {} links '{}' -> '{}', expected '{}' -> '{}'",
                    i, obs.from, obs.to, ids[i], ids[i + 1]
                )));
            }
            if obs.readings.is_empty() {
                return Err(LevelingError::Structure(format!(
                    "observation {} ('{}' -> '{}') has no readings", i, obs.from, obs.to
                )));
            }
        }
        Ok(())
    }

    // --- Accessors ---
    pub fn points(&self) -> &[Point] { &self.points }
    pub fn observations(&self) -> &[Observation] { &self.observations }
    pub fn closure(&self) -> ClosureKind { self.closure }
    pub fn initial_altitude(&self) -> f64 { self.initial_altitude }
    pub fn point_count(&self) -> usize { self.points.len() }

    pub fn first_point(&self) -> &Point { &self.points[0] }
    pub fn last_point(&self) -> &Point { &self.points[self.points.len() - 1] }

    /// Sum of all sighting distances, in kilometres.
    pub fn total_length_km(&self) -> f64 {
        self.observations.iter().map(Observation::distance_km).sum()
    }

    pub fn has_all_distances(&self) -> bool {
        self.observations.iter().all(|o| o.distance_m.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[&str]) -> Vec<Observation> {
        ids.windows(2)
            .map(|w| Observation::single(w[0], w[1], 1.5, 1.0, Some(100.0)))
            .collect()
    }

    #[test]
    fn test_open_line_fixes_both_ends() {
        let ids = ["A", "B", "C"];
        let line = LevelingLine::new(ids, 100.0, ClosureKind::Open { known_final_altitude: 101.0 }, chain(&ids)).unwrap();

        let roles: Vec<PointRole> = line.points().iter().map(|p| p.role).collect();
        assert_eq!(roles, vec![PointRole::Fixed, PointRole::Free, PointRole::Fixed]);
        assert_eq!(line.last_point().known_altitude, Some(101.0));
        assert!((line.total_length_km() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_closed_line_repeats_first_point() {
        let ids = ["A", "B", "C", "A"];
        let line = LevelingLine::new(ids, 50.0, ClosureKind::Closed, chain(&ids)).unwrap();
        assert!(line.last_point().is_fixed());
        assert_eq!(line.last_point().known_altitude, Some(50.0));
    }

    #[test]
    fn test_rejects_observation_count_mismatch() {
        let ids = ["A", "B", "C"];
        let err = LevelingLine::new(ids, 0.0, ClosureKind::Unconstrained, chain(&["A", "B"])).unwrap_err();
        assert!(matches!(err, LevelingError::Structure(msg) if msg.contains("require 2 observations")));
    }

    #[test]
    fn test_rejects_misordered_observation() {
        let ids = ["A", "B", "C"];
        let obs = vec![
            Observation::single("A", "B", 1.0, 1.0, None),
            Observation::single("C", "B", 1.0, 1.0, None),
        ];
        let err = LevelingLine::new(ids, 0.0, ClosureKind::Unconstrained, obs).unwrap_err();
        assert!(err.to_string().contains("expected 'B' -> 'C'"));
    }

    #[test]
    fn test_rejects_inconsistent_closure() {
        let ids = ["A", "B", "C"];
        assert!(LevelingLine::new(ids, 0.0, ClosureKind::Closed, chain(&ids)).is_err());

        let looped = ["A", "B", "A"];
        assert!(LevelingLine::new(looped, 0.0, ClosureKind::Unconstrained, chain(&looped)).is_err());
        assert!(LevelingLine::new(looped, 0.0, ClosureKind::Open { known_final_altitude: 0.0 }, chain(&looped)).is_err());
    }

    #[test]
    fn test_rejects_duplicate_interior_point() {
        let ids = ["A", "B", "C", "B"];
        let err = LevelingLine::new(ids, 0.0, ClosureKind::Unconstrained, chain(&ids)).unwrap_err();
        assert!(err.to_string().contains("duplicate point id 'B'"));
    }

    #[test]
    fn test_rejects_empty_readings() {
        let obs = vec![Observation::new("A", "B", std::iter::empty(), None)];
        assert!(LevelingLine::new(["A", "B"], 0.0, ClosureKind::Unconstrained, obs).is_err());
    }

    #[test]
    fn test_single_point_line() {
        let line = LevelingLine::new(["A"], 10.0, ClosureKind::Closed, vec![]).unwrap();
        assert_eq!(line.point_count(), 1);
        assert!(line.first_point().is_fixed());
    }

    #[test]
    fn test_deserialization_keeps_computed_state() {
        let ids = ["A", "B", "C"];
        let mut line = LevelingLine::new(ids, 100.0, ClosureKind::Unconstrained, chain(&ids)).unwrap();
        line.points[1].provisional_altitude = Some(100.5);
        line.observations[0].weight = Some(0.25);

        let back: LevelingLine = serde_json::from_value(serde_json::to_value(&line).unwrap()).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn test_deserialization_rejects_missing_observation() {
        let ids = ["A", "B", "C"];
        let line = LevelingLine::new(ids, 100.0, ClosureKind::Unconstrained, chain(&ids)).unwrap();
        let mut json = serde_json::to_value(&line).unwrap();
        json["observations"].as_array_mut().unwrap().pop();

        let err = serde_json::from_value::<LevelingLine>(json.clone()).unwrap_err();
        assert!(err.to_string().contains("require 2 observations"));

        let record: LineRecord = serde_json::from_value(json).unwrap();
        match LevelingLine::try_from(record) {
            Err(LevelingError::Structure(msg)) => assert!(msg.contains("3 points")),
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[test]
    fn test_deserialization_rebuilds_fixed_roles() {
        let ids = ["A", "B", "C", "A"];
        let line = LevelingLine::new(ids, 50.0, ClosureKind::Closed, chain(&ids)).unwrap();
        let mut json = serde_json::to_value(&line).unwrap();
        json["points"][3]["role"] = serde_json::json!("Free");
        json["points"][3]["known_altitude"] = serde_json::Value::Null;

        let back: LevelingLine = serde_json::from_value(json).unwrap();
        assert!(back.last_point().is_fixed());
        assert_eq!(back.last_point().known_altitude, Some(50.0));
    }
}
