use super::window::GroupMoveResult;
use serde::Serialize;
use std::fmt;

/// Why a proposed group move was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The leader's origin moved along an axis whose size did not change
    InconsistentResize,
    /// A touching relation would have been removed or loosened
    TopologyBroken,
    /// The requested leader is not a member of the group
    LeaderNotInGroup,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::InconsistentResize => "inconsistent resize",
            RejectReason::TopologyBroken => "group topology broken",
            RejectReason::LeaderNotInGroup => "leader not in group",
        };
        f.write_str(text)
    }
}

/// Result of feeding one bounds notification into a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Moves were computed and handed to the bounds applier
    Accepted(GroupMoveResult),
    /// Nothing was applied for this computation
    Rejected(RejectReason),
    /// Stored as the pending update of an open transaction
    Coalesced,
    /// Nothing to do: no transaction, or no pending update on a tick
    Unchanged,
}

impl MoveOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveOutcome::Accepted(_))
    }

    pub fn result(&self) -> Option<&GroupMoveResult> {
        match self {
            MoveOutcome::Accepted(result) => Some(result),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<RejectReason> {
        match self {
            MoveOutcome::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}
