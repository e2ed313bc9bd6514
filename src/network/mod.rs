//! Network model builder: design rows, weights and misclosures.
pub mod model;
pub mod topology;

pub use model::{observation_weight, weighting_distance_km, NetworkModel, NetworkRow, RowEntries, RowOrigin};
pub use topology::check_connectivity;
