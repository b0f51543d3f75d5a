use crate::geometry::{AdjacencyGraph, CanonicalGraph, Rectangle};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the distance of a surviving edge may evolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceRule {
    /// Edges may tighten but never loosen
    NotFarther,
    /// Edges keep exactly their distance
    #[default]
    Exact,
}

impl DistanceRule {
    fn allows(self, before: i32, after: i32) -> bool {
        match self {
            DistanceRule::NotFarther => after <= before,
            DistanceRule::Exact => after == before,
        }
    }
}

/// True when every edge of `sub` appears in `sup` with the same side pairing
/// and a distance allowed by `rule`. A graph with more nodes than `sup` is
/// never a subgraph of it.
pub fn is_subgraph(sub: &CanonicalGraph, sup: &CanonicalGraph, rule: DistanceRule) -> bool {
    if sub.node_count() > sup.node_count() {
        return false;
    }

    sub.iter().all(|(key, before)| match sup.distance(key) {
        Some(after) => rule.allows(*before, after),
        None => false,
    })
}

/// Decides whether a proposed layout keeps the group's touching relations
#[derive(Debug, Clone, Copy)]
pub struct GraphInvariantChecker {
    tolerance: i32,
}

impl GraphInvariantChecker {
    pub fn new(tolerance: i32) -> Self {
        Self { tolerance }
    }

    /// Compare the adjacency of `before` with that of `after`, index by index
    pub fn is_valid_transition(
        &self,
        before: &[Rectangle],
        after: &[Rectangle],
        rule: DistanceRule,
    ) -> bool {
        if before.len() != after.len() {
            debug!(
                "Rejecting transition between {} and {} rectangles",
                before.len(),
                after.len()
            );
            return false;
        }

        let before_graph = AdjacencyGraph::build(before, self.tolerance).canonical();
        let after_graph = AdjacencyGraph::build(after, self.tolerance).canonical();
        let valid = is_subgraph(&before_graph, &after_graph, rule);
        if !valid {
            debug!(
                edges_before = before_graph.edge_count(),
                edges_after = after_graph.edge_count(),
                ?rule,
                "Adjacency graph does not survive the transition"
            );
        }
        valid
    }
}
