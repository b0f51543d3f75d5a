use crate::config::EngineConfig;
use crate::geometry::Rectangle;
use crate::models::{
    BoundsChangingPayload, GroupId, GroupMember, MoveOutcome, PartialBounds, WindowRef,
};
use crate::services::group_orchestrator::{GroupMoveOrchestrator, HostBindings};
use crate::{DockGroupError, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

/// Owns one orchestrator per window group and routes host notifications to it.
///
/// A group is created by the first member that joins without naming a group
/// and disposed once its last member has left and no gesture is running.
pub struct GroupRegistry {
    config: EngineConfig,
    host: HostBindings,
    groups: BTreeMap<GroupId, GroupMoveOrchestrator>,
    windows: HashMap<WindowRef, GroupId>,
}

impl GroupRegistry {
    pub fn new(config: EngineConfig, host: HostBindings) -> Self {
        Self {
            config,
            host,
            groups: BTreeMap::new(),
            windows: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupMoveOrchestrator> {
        self.groups.get(&id)
    }

    pub fn group_of(&self, window: &WindowRef) -> Option<GroupId> {
        self.windows.get(window).copied()
    }

    /// Add `member` to `group`, or to a fresh group when `group` is `None`.
    ///
    /// While the target group runs a gesture the member is queued and only
    /// becomes routable once the gesture ends.
    pub fn join(&mut self, member: GroupMember, group: Option<GroupId>) -> Result<GroupId> {
        if let Some(existing) = self.group_of(&member.window) {
            return Err(DockGroupError::ValidationError(format!(
                "Window {} already belongs to group {}",
                member.window, existing
            ))
            .into());
        }
        if let Some(pending) = self.pending_group_of(&member.window) {
            return Err(DockGroupError::ValidationError(format!(
                "Window {} is already queued to join group {}",
                member.window, pending
            ))
            .into());
        }

        let id = match group {
            Some(id) if self.groups.contains_key(&id) => id,
            Some(id) => return Err(DockGroupError::GroupNotFound(id).into()),
            None => {
                let id = Uuid::new_v4();
                let orchestrator =
                    GroupMoveOrchestrator::new(id, self.config.clone(), self.host.clone());
                self.groups.insert(id, orchestrator);
                info!(group = %id, "Group created");
                id
            }
        };

        if let Some(orchestrator) = self.groups.get_mut(&id) {
            orchestrator.add_member(member)?;
        }
        self.reconcile(id);
        Ok(id)
    }

    pub fn leave(&mut self, window: &WindowRef) -> Result<GroupId> {
        let id = self.route(window)?;
        self.orchestrator_mut(id)?.remove_member(window)?;
        self.reconcile(id);
        Ok(id)
    }

    pub fn sync_member_bounds(&mut self, window: &WindowRef, bounds: Rectangle) -> Result<()> {
        let id = self.route(window)?;
        self.orchestrator_mut(id)?.sync_member_bounds(window, bounds)
    }

    pub fn bounds_changing(
        &mut self,
        window: &WindowRef,
        payload: BoundsChangingPayload,
    ) -> Result<MoveOutcome> {
        let id = self.route(window)?;
        self.orchestrator_mut(id)?.bounds_changing(window, payload)
    }

    pub fn end_interaction(&mut self, window: &WindowRef) -> Result<MoveOutcome> {
        let id = self.route(window)?;
        let outcome = self.orchestrator_mut(id)?.end_interaction(window);
        self.reconcile(id);
        outcome
    }

    pub fn set_bounds(&mut self, window: &WindowRef, bounds: PartialBounds) -> Result<MoveOutcome> {
        let id = self.route(window)?;
        self.orchestrator_mut(id)?.set_bounds(window, bounds)
    }

    pub fn update_bounds(
        &mut self,
        window: &WindowRef,
        delta: PartialBounds,
    ) -> Result<MoveOutcome> {
        let id = self.route(window)?;
        self.orchestrator_mut(id)?.update_bounds(window, delta)
    }

    /// Coalescing tick for one group
    pub fn tick(&mut self, id: GroupId) -> Result<MoveOutcome> {
        self.orchestrator_mut(id)?.tick()
    }

    /// Coalescing tick for every group with an open transaction
    pub fn tick_all(&mut self) -> Vec<(GroupId, Result<MoveOutcome>)> {
        self.groups
            .iter_mut()
            .filter(|(_, orchestrator)| !orchestrator.is_idle())
            .map(|(id, orchestrator)| (*id, orchestrator.tick()))
            .collect()
    }

    /// Group holding `window` in its queue of deferred joins
    fn pending_group_of(&self, window: &WindowRef) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|(_, orchestrator)| orchestrator.has_pending_member(window))
            .map(|(id, _)| *id)
    }

    fn route(&self, window: &WindowRef) -> Result<GroupId> {
        self.group_of(window)
            .ok_or_else(|| DockGroupError::WindowNotFound(window.clone()).into())
    }

    fn orchestrator_mut(&mut self, id: GroupId) -> Result<&mut GroupMoveOrchestrator> {
        self.groups
            .get_mut(&id)
            .ok_or_else(|| DockGroupError::GroupNotFound(id).into())
    }

    /// Bring the window index in line with the members of `id` and dispose
    /// the group once it is empty and idle.
    fn reconcile(&mut self, id: GroupId) {
        let Some(orchestrator) = self.groups.get(&id) else {
            return;
        };

        self.windows
            .retain(|window, group| *group != id || orchestrator.contains(window));
        for member in orchestrator.members() {
            self.windows.insert(member.window.clone(), id);
        }

        if orchestrator.is_empty() && orchestrator.is_idle() {
            self.groups.remove(&id);
            self.host.scheduler.stop(id);
            debug!(group = %id, "Group disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeType, RecordingBoundsApplier, RecordingEventSink};
    use crate::services::tick_scheduler::ManualTickScheduler;
    use std::sync::Arc;

    fn registry() -> GroupRegistry {
        let host = HostBindings::new(
            Arc::new(RecordingBoundsApplier::new()),
            Arc::new(RecordingEventSink::new()),
            Arc::new(ManualTickScheduler::new()),
        );
        GroupRegistry::new(EngineConfig::default(), host)
    }

    fn member(name: &str, rect: Rectangle) -> GroupMember {
        GroupMember::new(WindowRef::new("app", name), rect)
    }

    #[test]
    fn group_lives_from_first_join_to_last_leave() {
        let mut registry = registry();
        let id = registry
            .join(member("a", Rectangle::new(0, 0, 100, 100)), None)
            .unwrap();
        registry
            .join(member("b", Rectangle::new(100, 0, 100, 100)), Some(id))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.group_of(&WindowRef::new("app", "b")), Some(id));

        registry.leave(&WindowRef::new("app", "a")).unwrap();
        assert_eq!(registry.len(), 1);
        registry.leave(&WindowRef::new("app", "b")).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.group_of(&WindowRef::new("app", "b")), None);
    }

    #[test]
    fn joining_unknown_group_fails() {
        let mut registry = registry();
        let err = registry
            .join(member("a", Rectangle::new(0, 0, 10, 10)), Some(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DockGroupError>(),
            Some(DockGroupError::GroupNotFound(_))
        ));
    }

    #[test]
    fn queued_window_cannot_join_a_second_group() {
        let mut registry = registry();
        let a = WindowRef::new("app", "a");
        let c = WindowRef::new("app", "c");
        let first = registry
            .join(member("a", Rectangle::new(0, 0, 100, 100)), None)
            .unwrap();
        registry
            .bounds_changing(
                &a,
                BoundsChangingPayload::new(Rectangle::new(5, 0, 100, 100), ChangeType::Position),
            )
            .unwrap();

        registry
            .join(member("c", Rectangle::new(0, 100, 100, 100)), Some(first))
            .unwrap();
        let err = registry
            .join(member("c", Rectangle::new(0, 100, 100, 100)), None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DockGroupError>(),
            Some(DockGroupError::ValidationError(_))
        ));
        assert_eq!(registry.len(), 1);

        registry.end_interaction(&a).unwrap();
        assert_eq!(registry.group_of(&c), Some(first));
        registry.leave(&c).unwrap();
        assert_eq!(registry.group_of(&c), None);
    }

    #[test]
    fn leaving_during_a_gesture_keeps_the_group_until_it_ends() {
        let mut registry = registry();
        let a = WindowRef::new("app", "a");
        let id = registry
            .join(member("a", Rectangle::new(0, 0, 100, 100)), None)
            .unwrap();

        registry
            .bounds_changing(
                &a,
                BoundsChangingPayload::new(Rectangle::new(5, 0, 100, 100), ChangeType::Position),
            )
            .unwrap();
        registry.leave(&a).unwrap();
        assert_eq!(registry.group_of(&a), Some(id));
        assert_eq!(registry.tick_all().len(), 1);

        registry.end_interaction(&a).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.group_of(&a), None);
    }
}
