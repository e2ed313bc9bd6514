use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Most observations are taken with one to three instruments.
pub type Readings = SmallVec<[ReadingPair; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub String);

impl PointId {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for PointId {
    fn from(s: String) -> Self { Self(s) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointRole {
    /// Altitude is known and held fixed by the adjustment.
    Fixed,
    /// Altitude is estimated.
    Free,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    /// Position along the line.
    pub index: usize,
    pub role: PointRole,
    pub known_altitude: Option<f64>,
    /// Set by altitude propagation.
    pub provisional_altitude: Option<f64>,
    /// Set once the adjustment has been solved.
    pub adjusted_altitude: Option<f64>,
}

impl Point {
    pub fn is_fixed(&self) -> bool { self.role == PointRole::Fixed }
}

/// One instrument's pair of rod readings, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingPair {
    /// Reading toward the previous point.
    pub backsight: f64,
    /// Reading toward the next point.
    pub foresight: f64,
}

impl ReadingPair {
    pub fn new(backsight: f64, foresight: f64) -> Self {
        Self { backsight, foresight }
    }

    #[inline]
    pub fn height_difference(&self) -> f64 {
        self.backsight - self.foresight
    }
}

/// Agreement between the instruments of a single observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentControl {
    /// Height difference per instrument (m).
    pub differences_m: SmallVec<[f64; 4]>,
    /// Controlled value: arithmetic mean of `differences_m`.
    pub mean_m: f64,
    /// Per-instrument residual against the mean (m).
    pub residuals_m: SmallVec<[f64; 4]>,
    /// max - min of `differences_m` (m).
    pub spread_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub from: PointId,
    pub to: PointId,
    pub readings: Readings,
    pub distance_m: Option<f64>,

    // --- Populated by the pipeline ---
    pub control: Option<InstrumentControl>,
    pub derived_dh_m: Option<f64>,
    pub atmospheric_correction_m: Option<f64>,
    pub corrected_dh_m: Option<f64>,
    /// Adjustment weight (1/mm²), shared by every row the observation produces.
    pub weight: Option<f64>,
    /// One residual per adjustment row this observation produced (mm).
    pub residuals_mm: SmallVec<[f64; 4]>,
}

impl Observation {
    pub fn new(
        from: impl Into<PointId>,
        to: impl Into<PointId>,
        readings: impl IntoIterator<Item = ReadingPair>,
        distance_m: Option<f64>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            readings: readings.into_iter().collect(),
            distance_m,
            control: None,
            derived_dh_m: None,
            atmospheric_correction_m: None,
            corrected_dh_m: None,
            weight: None,
            residuals_mm: SmallVec::new(),
        }
    }

    /// Shorthand for a single-instrument observation.
    pub fn single(
        from: impl Into<PointId>,
        to: impl Into<PointId>,
        backsight: f64,
        foresight: f64,
        distance_m: Option<f64>,
    ) -> Self {
        Self::new(from, to, [ReadingPair::new(backsight, foresight)], distance_m)
    }

    /// The height difference that enters the network model: corrected if the
    /// atmospheric stage ran, otherwise the derived value.
    pub fn effective_dh_m(&self) -> Option<f64> {
        self.corrected_dh_m.or(self.derived_dh_m)
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m.unwrap_or(0.0) / 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClosureKind {
    /// Loop returning to its starting point.
    Closed,
    /// Line ending on a distinct point of known altitude.
    Open { known_final_altitude: f64 },
    /// Line ending on a distinct point of unknown altitude.
    Unconstrained,
}

impl ClosureKind {
    pub fn label(&self) -> &'static str {
        match self {
            ClosureKind::Closed => "closed",
            ClosureKind::Open { .. } => "open",
            ClosureKind::Unconstrained => "unconstrained",
        }
    }
}
