use crate::geometry::{AdjacencyGraph, EdgeRules, RectDelta, Rectangle};
use crate::models::{ChangeType, RejectReason};
use tracing::trace;

/// Candidate layout for every group member, index aligned with the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    Accepted(Vec<Rectangle>),
    Rejected(RejectReason),
}

impl Proposal {
    /// Indices and rectangles that differ from `initial`
    pub fn changed(&self, initial: &[Rectangle]) -> Vec<(usize, Rectangle)> {
        match self {
            Proposal::Accepted(rects) => rects
                .iter()
                .zip(initial)
                .enumerate()
                .filter(|(_, (proposed, original))| proposed.moved(original))
                .map(|(index, (proposed, _))| (index, *proposed))
                .collect(),
            Proposal::Rejected(_) => Vec::new(),
        }
    }
}

/// Spreads a leader's change over the rest of its group
#[derive(Debug, Clone, Copy, Default)]
pub struct MovePropagator {
    rules: EdgeRules,
}

impl MovePropagator {
    pub fn new(rules: EdgeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &EdgeRules {
        &self.rules
    }

    /// Compute a new rectangle for every member after `initial[leader]`
    /// changed by `delta`.
    pub fn propagate(
        &self,
        leader: usize,
        initial: &[Rectangle],
        delta: RectDelta,
        change: ChangeType,
    ) -> Proposal {
        if leader >= initial.len() {
            return Proposal::Rejected(RejectReason::LeaderNotInGroup);
        }

        match change {
            ChangeType::Position => {
                Proposal::Accepted(initial.iter().map(|rect| rect.shift(delta)).collect())
            }
            ChangeType::Size => self.resize(leader, initial, delta),
            ChangeType::PositionAndSize => {
                // The part of the origin shift not explained by the resize is a translation.
                let x_shift = if delta.x != 0 { delta.x + delta.width } else { 0 };
                let y_shift = if delta.y != 0 { delta.y + delta.height } else { 0 };
                let resize = RectDelta::new(
                    delta.x - x_shift,
                    delta.y - y_shift,
                    delta.width,
                    delta.height,
                );
                let translate = RectDelta::new(x_shift, y_shift, 0, 0);

                match self.resize(leader, initial, resize) {
                    Proposal::Accepted(resized) => Proposal::Accepted(
                        resized.iter().map(|rect| rect.shift(translate)).collect(),
                    ),
                    rejected => rejected,
                }
            }
        }
    }

    fn resize(&self, leader: usize, initial: &[Rectangle], delta: RectDelta) -> Proposal {
        if (delta.x != 0 && delta.width == 0) || (delta.y != 0 && delta.height == 0) {
            return Proposal::Rejected(RejectReason::InconsistentResize);
        }

        let graph = AdjacencyGraph::build(initial, self.rules.tolerance);
        let mut resolved: Vec<Option<Rectangle>> = vec![None; initial.len()];

        for visit in graph.breadth_order(leader) {
            let rect = match visit.parent {
                None => initial[visit.index].resize_by(delta),
                Some(parent) => {
                    let parent_to = resolved[parent].unwrap_or(initial[parent]);
                    initial[visit.index].follow_leader(&initial[parent], &parent_to, &self.rules)
                }
            };
            trace!(index = visit.index, parent = ?visit.parent, %rect, "Resolved member");
            resolved[visit.index] = Some(rect);
        }

        Proposal::Accepted(
            resolved
                .into_iter()
                .zip(initial)
                .map(|(rect, original)| rect.unwrap_or(*original))
                .collect(),
        )
    }
}
