use super::model::NetworkModel;
use crate::error::{LevelingError, Result};
use petgraph::unionfind::UnionFind;

/// Checks that every unknown is tied to the datum through observations.
///
/// Node 0 stands for all fixed points together; unknown `c` is node `c + 1`.
/// A row with a single entry links its unknown to the datum, a row with two
/// entries links the two unknowns. Any unknown left outside the datum's set
/// makes the normal matrix singular.
pub fn check_connectivity(model: &NetworkModel) -> Result<()> {
    let n = model.unknown_count();
    let mut sets = UnionFind::<usize>::new(n + 1);

    for row in model.rows() {
        match row.entries.as_slice() {
            [(c, _)] => {
                sets.union(0, c + 1);
            }
            [(a, _), (b, _)] => {
                sets.union(a + 1, b + 1);
            }
            _ => {}
        }
    }

    let floating: Vec<String> = (0..n)
        .filter(|&c| !sets.equiv(0, c + 1))
        .map(|c| model.unknowns()[c].to_string())
        .collect();

    if floating.is_empty() {
        Ok(())
    } else {
        Err(LevelingError::SingularSystem(format!(
            "no observation path to a fixed point for {}",
            floating.join(", ")
        )))
    }
}
