use crate::config::EngineConfig;
use crate::geometry::{Rectangle, RectDelta};
use crate::models::{
    BoundsApplier, BoundsChangingPayload, BoundsEvent, ChangeType, EventReason, EventSink,
    GroupId, GroupMember, GroupMoveResult, Move, MoveOutcome, PartialBounds, RejectReason,
    WindowRef,
};
use crate::services::graph_invariant::{DistanceRule, GraphInvariantChecker};
use crate::services::move_propagator::{MovePropagator, Proposal};
use crate::services::tick_scheduler::TickScheduler;
use crate::{DockGroupError, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Host collaborators a group talks to
#[derive(Clone)]
pub struct HostBindings {
    pub applier: Arc<dyn BoundsApplier>,
    pub events: Arc<dyn EventSink>,
    pub scheduler: Arc<dyn TickScheduler>,
}

impl HostBindings {
    pub fn new(
        applier: Arc<dyn BoundsApplier>,
        events: Arc<dyn EventSink>,
        scheduler: Arc<dyn TickScheduler>,
    ) -> Self {
        Self {
            applier,
            events,
            scheduler,
        }
    }
}

/// Externally visible state of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    TransactionOpen { leader: WindowRef },
}

/// One user gesture, from the first bounds-changing notification to its end
#[derive(Debug)]
struct Transaction {
    leader: WindowRef,
    /// Member rectangles when the gesture started, index aligned with members
    started_from: Vec<Rectangle>,
    /// Most recent raw bounds received
    last: BoundsChangingPayload,
    /// Update waiting for the next tick
    pending: Option<BoundsChangingPayload>,
    change_type: ChangeType,
}

/// Membership edits received while a gesture was running
#[derive(Debug)]
enum MembershipChange {
    Add(GroupMember),
    Remove(WindowRef),
    Sync { window: WindowRef, bounds: Rectangle },
}

/// Per-group transaction state machine: classifies changes, plans group
/// moves and hands accepted results to the host.
pub struct GroupMoveOrchestrator {
    id: GroupId,
    config: EngineConfig,
    propagator: MovePropagator,
    checker: GraphInvariantChecker,
    members: Vec<GroupMember>,
    transaction: Option<Transaction>,
    queued: Vec<MembershipChange>,
    host: HostBindings,
}

impl GroupMoveOrchestrator {
    pub fn new(id: GroupId, config: EngineConfig, host: HostBindings) -> Self {
        Self {
            id,
            propagator: MovePropagator::new(config.edge_rules()),
            checker: GraphInvariantChecker::new(config.tolerance_px),
            config,
            members: Vec::new(),
            transaction: None,
            queued: Vec::new(),
            host,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn state(&self) -> OrchestratorState {
        match &self.transaction {
            Some(transaction) => OrchestratorState::TransactionOpen {
                leader: transaction.leader.clone(),
            },
            None => OrchestratorState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.transaction.is_none()
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    pub fn member(&self, window: &WindowRef) -> Option<&GroupMember> {
        self.members.iter().find(|member| &member.window == window)
    }

    pub fn contains(&self, window: &WindowRef) -> bool {
        self.member(window).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True when `window` is queued to join once the running gesture ends
    pub fn has_pending_member(&self, window: &WindowRef) -> bool {
        self.queued.iter().any(|change| {
            matches!(change, MembershipChange::Add(member) if &member.window == window)
        })
    }

    /// Number of membership edits waiting for the gesture to end
    pub fn queued_changes(&self) -> usize {
        self.queued.len()
    }

    fn index_of(&self, window: &WindowRef) -> Result<usize> {
        self.members
            .iter()
            .position(|member| &member.window == window)
            .ok_or_else(|| DockGroupError::WindowNotFound(window.clone()).into())
    }

    /// Add a window; deferred until the running gesture ends
    pub fn add_member(&mut self, member: GroupMember) -> Result<()> {
        if self.contains(&member.window) || self.has_pending_member(&member.window) {
            return Err(DockGroupError::ValidationError(format!(
                "Window {} is already a member of group {}",
                member.window, self.id
            ))
            .into());
        }

        if self.transaction.is_some() {
            debug!(group = %self.id, window = %member.window, "Deferring member add");
            self.queued.push(MembershipChange::Add(member));
        } else {
            info!(group = %self.id, window = %member.window, rect = %member.rect, "Member added");
            self.members.push(member);
        }
        Ok(())
    }

    /// Remove a window; deferred until the running gesture ends
    pub fn remove_member(&mut self, window: &WindowRef) -> Result<()> {
        let index = self.index_of(window)?;

        if self.transaction.is_some() {
            debug!(group = %self.id, %window, "Deferring member removal");
            self.queued.push(MembershipChange::Remove(window.clone()));
        } else {
            self.members.remove(index);
            info!(group = %self.id, %window, "Member removed");
        }
        Ok(())
    }

    /// Record bounds the host changed on its own, given in host coordinates
    pub fn sync_member_bounds(&mut self, window: &WindowRef, bounds: Rectangle) -> Result<()> {
        let index = self.index_of(window)?;

        if self.transaction.is_some() {
            self.queued.push(MembershipChange::Sync {
                window: window.clone(),
                bounds,
            });
        } else {
            let member = &mut self.members[index];
            member.rect = Rectangle::normalize_external(&bounds, &member.offset).clamped();
        }
        Ok(())
    }

    /// Handle a bounds-changing notification for `window`.
    ///
    /// The first notification opens a transaction and is computed right away;
    /// later ones only replace the pending update drained by [`Self::tick`].
    #[instrument(skip(self, payload), fields(group = %self.id))]
    pub fn bounds_changing(
        &mut self,
        window: &WindowRef,
        payload: BoundsChangingPayload,
    ) -> Result<MoveOutcome> {
        let tagged = payload.change_type()?;

        if let Some(transaction) = self.transaction.as_mut() {
            if &transaction.leader != window {
                debug!(leader = %transaction.leader, "Ignoring notification from a follower");
                return Ok(MoveOutcome::Unchanged);
            }
            transaction.last = payload;
            transaction.pending = Some(payload);
            return Ok(MoveOutcome::Coalesced);
        }

        let index = self.index_of(window)?;
        debug!(bounds = %payload.bounds(), ?tagged, "Opening transaction");
        self.transaction = Some(Transaction {
            leader: window.clone(),
            started_from: self.members.iter().map(|member| member.rect).collect(),
            last: payload,
            pending: None,
            change_type: tagged,
        });
        self.host.scheduler.start(self.id, self.config.tick_interval());

        self.log_tag_mismatch(index, &payload, tagged);
        let outcome = self.plan_move(window, payload.bounds());
        self.settle(window, outcome, EmitMode::Changing)
    }

    /// Drain the pending update of the open transaction, if there is one
    #[instrument(skip(self), fields(group = %self.id))]
    pub fn tick(&mut self) -> Result<MoveOutcome> {
        let Some(transaction) = self.transaction.as_mut() else {
            return Ok(MoveOutcome::Unchanged);
        };
        let Some(payload) = transaction.pending.take() else {
            return Ok(MoveOutcome::Unchanged);
        };
        let leader = transaction.leader.clone();

        let outcome = self.plan_move(&leader, payload.bounds());
        self.settle(&leader, outcome, EmitMode::Changing)
    }

    /// Close the gesture of `window`: one final computation from the last
    /// known bounds, "changed" events for every follower that moved, then
    /// the membership edits that were held back.
    #[instrument(skip(self), fields(group = %self.id))]
    pub fn end_interaction(&mut self, window: &WindowRef) -> Result<MoveOutcome> {
        match &self.transaction {
            Some(transaction) if &transaction.leader == window => {}
            Some(transaction) => {
                debug!(leader = %transaction.leader, "End signal from a follower ignored");
                return Ok(MoveOutcome::Unchanged);
            }
            None => {
                debug!("End signal without an open transaction");
                return Ok(MoveOutcome::Unchanged);
            }
        }

        let mut transaction = match self.transaction.take() {
            Some(transaction) => transaction,
            None => return Ok(MoveOutcome::Unchanged),
        };
        transaction.pending = None;
        self.host.scheduler.stop(self.id);

        let outcome = self
            .plan_move(window, transaction.last.bounds())
            .and_then(|outcome| self.apply_outcome(outcome, window, EmitMode::Silent));
        if let Ok(MoveOutcome::Accepted(result)) = &outcome {
            transaction.change_type = result.change_type;
        }

        for (member, started) in self.members.iter().zip(&transaction.started_from) {
            if member.window == transaction.leader || !member.rect.moved(started) {
                continue;
            }
            self.host.events.publish(BoundsEvent::changed(
                member.window.clone(),
                &member.external_bounds(),
                transaction.change_type,
                EventReason::Group,
            ));
        }

        self.apply_queued();
        info!(leader = %transaction.leader, members = self.members.len(), "Transaction closed");
        outcome
    }

    /// Move `window` to `bounds` (host coordinates, missing fields kept)
    /// outside of any gesture.
    #[instrument(skip(self), fields(group = %self.id))]
    pub fn set_bounds(
        &mut self,
        window: &WindowRef,
        bounds: PartialBounds,
    ) -> Result<MoveOutcome> {
        self.ensure_idle()?;
        let index = self.index_of(window)?;
        let target = bounds.fill(&self.members[index].external_bounds());

        let outcome = self.plan_move(window, target);
        self.settle(window, outcome, EmitMode::Changed)
    }

    /// Change `window` by `delta` (missing fields are zero) outside of any gesture
    #[instrument(skip(self), fields(group = %self.id))]
    pub fn update_bounds(
        &mut self,
        window: &WindowRef,
        delta: PartialBounds,
    ) -> Result<MoveOutcome> {
        self.ensure_idle()?;
        let index = self.index_of(window)?;
        let target = self.members[index]
            .external_bounds()
            .resize_by(delta.to_delta());

        let outcome = self.plan_move(window, target);
        self.settle(window, outcome, EmitMode::Changed)
    }

    /// Compute the group move for `window` reaching `requested` (host
    /// coordinates) without applying anything.
    ///
    /// Policy rejections come back as [`MoveOutcome::Rejected`]; a leader that
    /// would not land on the requested rectangle is an error.
    pub fn plan_move(&self, window: &WindowRef, requested: Rectangle) -> Result<MoveOutcome> {
        let index = self.index_of(window)?;
        let leader = &self.members[index];
        let target = Rectangle::normalize_external(&requested, &leader.offset).clamped();
        let delta = leader.rect.delta(&target);
        if delta.is_zero() {
            return Ok(MoveOutcome::Unchanged);
        }

        let change_type = ChangeType::classify(&delta);
        let initial: Vec<Rectangle> = self.members.iter().map(|member| member.rect).collect();
        let proposal = crate::trace_performance!("plan_move", {
            self.propagator.propagate(index, &initial, delta, change_type)
        });

        let proposed = match proposal {
            Proposal::Accepted(rects) => rects,
            Proposal::Rejected(reason) => {
                debug!(%window, %reason, ?delta, "Move rejected by propagation");
                return Ok(MoveOutcome::Rejected(reason));
            }
        };

        ensure_leader_lands(window, target, proposed[index])?;

        let rule = match change_type {
            ChangeType::Position => DistanceRule::NotFarther,
            ChangeType::Size | ChangeType::PositionAndSize => self.config.resize_distance_rule,
        };
        if !self.checker.is_valid_transition(&initial, &proposed, rule) {
            debug!(%window, ?change_type, "Move rejected, group topology would break");
            return Ok(MoveOutcome::Rejected(RejectReason::TopologyBroken));
        }

        let moves = proposed
            .iter()
            .zip(&self.members)
            .filter(|(rect, member)| rect.moved(&member.rect))
            .map(|(rect, member)| Move {
                window: member.window.clone(),
                rect: *rect,
                offset: member.offset,
            })
            .collect();

        Ok(MoveOutcome::Accepted(GroupMoveResult {
            change_type,
            leader: target,
            moves,
        }))
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(DockGroupError::TransactionOpen(self.id).into());
        }
        Ok(())
    }

    fn settle(
        &mut self,
        leader: &WindowRef,
        outcome: Result<MoveOutcome>,
        mode: EmitMode,
    ) -> Result<MoveOutcome> {
        let outcome = self.apply_outcome(outcome?, leader, mode)?;
        if let (Some(transaction), MoveOutcome::Accepted(result)) =
            (self.transaction.as_mut(), &outcome)
        {
            transaction.change_type = result.change_type;
        }
        Ok(outcome)
    }

    /// Hand an accepted result to the host, commit it and publish events
    fn apply_outcome(
        &mut self,
        outcome: MoveOutcome,
        leader: &WindowRef,
        mode: EmitMode,
    ) -> Result<MoveOutcome> {
        let result = match &outcome {
            MoveOutcome::Accepted(result) => result,
            _ => return Ok(outcome),
        };

        self.host.applier.apply(result)?;

        for mv in &result.moves {
            if let Some(member) = self.members.iter_mut().find(|m| m.window == mv.window) {
                member.rect = mv.rect;
            }

            let reason = if &mv.window == leader {
                EventReason::Own
            } else {
                EventReason::Group
            };
            let bounds = mv.external_bounds();
            match mode {
                EmitMode::Changing => self.host.events.publish(BoundsEvent::changing(
                    mv.window.clone(),
                    &bounds,
                    result.change_type,
                    reason,
                )),
                EmitMode::Changed => self.host.events.publish(BoundsEvent::changed(
                    mv.window.clone(),
                    &bounds,
                    result.change_type,
                    reason,
                )),
                EmitMode::Silent => {}
            }
        }

        debug!(moves = result.moves.len(), change_type = ?result.change_type, "Group move applied");
        Ok(outcome)
    }

    fn apply_queued(&mut self) {
        for change in std::mem::take(&mut self.queued) {
            let applied = match change {
                MembershipChange::Add(member) => self.add_member(member),
                MembershipChange::Remove(window) => self.remove_member(&window),
                MembershipChange::Sync { window, bounds } => {
                    self.sync_member_bounds(&window, bounds)
                }
            };
            if let Err(err) = applied {
                warn!(group = %self.id, "Dropping deferred membership change: {}", err);
            }
        }
    }

    fn log_tag_mismatch(&self, index: usize, payload: &BoundsChangingPayload, tagged: ChangeType) {
        let member = &self.members[index];
        let target = Rectangle::normalize_external(&payload.bounds(), &member.offset).clamped();
        let delta: RectDelta = member.rect.delta(&target);
        let classified = ChangeType::classify(&delta);
        if !delta.is_zero() && classified != tagged {
            debug!(?tagged, ?classified, "Host change tag disagrees with the delta");
        }
    }
}

/// A proposal that moves the leader anywhere but the requested rectangle
/// is a propagation fault, never a policy rejection.
fn ensure_leader_lands(
    window: &WindowRef,
    requested: Rectangle,
    proposed: Rectangle,
) -> Result<()> {
    if proposed != requested {
        return Err(DockGroupError::LeaderMismatch {
            window: window.clone(),
            requested,
            proposed,
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitMode {
    /// Deferred events while a gesture runs
    Changing,
    /// Final events for API moves
    Changed,
    /// No events; the caller publishes its own
    Silent,
}
