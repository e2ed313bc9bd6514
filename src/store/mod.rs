//! Survey data: points, observations and the leveling line joining them.
pub mod line;
pub mod types;

pub use line::LevelingLine;
pub use types::*;
