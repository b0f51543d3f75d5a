//! End-to-end group move flows driven through the orchestrator and registry

use dockgroup::config::EngineConfig;
use dockgroup::{
    BoundsApplier, BoundsChangingPayload, BoundsEvent, BoundsTopic, ChangeType, DistanceRule,
    DockGroupError, EventReason, EventSink, GraphInvariantChecker, GroupId, GroupMember,
    GroupMoveOrchestrator, GroupMoveResult, GroupRegistry, HostBindings, ManualTickScheduler,
    MoveOutcome, MovePropagator, OrchestratorState, PartialBounds, Proposal, RectDelta,
    RecordingBoundsApplier, RecordingEventSink, Rectangle, RejectReason, TickScheduler,
    TokioTickScheduler, WindowRef, DEFAULT_TOLERANCE_PX,
};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

mock! {
    pub Applier {}
    impl BoundsApplier for Applier {
        fn apply(&self, result: &GroupMoveResult) -> dockgroup::Result<()>;
    }
}

mock! {
    pub Events {}
    impl EventSink for Events {
        fn publish(&self, event: BoundsEvent);
    }
}

mock! {
    pub Scheduler {}
    impl TickScheduler for Scheduler {
        fn start(&self, group: GroupId, interval: Duration);
        fn stop(&self, group: GroupId);
    }
}

fn window(name: &str) -> WindowRef {
    WindowRef::new("app", name)
}

fn rect(x: i32, y: i32, width: i32, height: i32) -> Rectangle {
    Rectangle::new(x, y, width, height)
}

fn changing(bounds: Rectangle, change: ChangeType) -> BoundsChangingPayload {
    BoundsChangingPayload::new(bounds, change)
}

fn group_with(host: HostBindings, members: &[(&str, Rectangle)]) -> GroupMoveOrchestrator {
    let mut group = GroupMoveOrchestrator::new(Uuid::new_v4(), EngineConfig::default(), host);
    for (name, bounds) in members {
        group
            .add_member(GroupMember::new(window(name), *bounds))
            .unwrap();
    }
    group
}

struct Recorded {
    applier: Arc<RecordingBoundsApplier>,
    events: Arc<RecordingEventSink>,
    scheduler: Arc<ManualTickScheduler>,
}

impl Recorded {
    fn new() -> Self {
        Self {
            applier: Arc::new(RecordingBoundsApplier::new()),
            events: Arc::new(RecordingEventSink::new()),
            scheduler: Arc::new(ManualTickScheduler::new()),
        }
    }

    fn host(&self) -> HostBindings {
        HostBindings::new(
            self.applier.clone(),
            self.events.clone(),
            self.scheduler.clone(),
        )
    }
}

#[test]
fn resizing_the_right_window_drags_its_neighbour() {
    let mut applier = MockApplier::new();
    applier
        .expect_apply()
        .withf(|result| {
            result.change_type == ChangeType::Size
                && result.moves.len() == 2
                && result.move_for(&window("a")).map(|mv| mv.rect) == Some(rect(0, 0, 90, 100))
        })
        .times(1)
        .returning(|_| Ok(()));

    let mut events = MockEvents::new();
    events
        .expect_publish()
        .withf(|event| event.topic == BoundsTopic::Changing)
        .times(2)
        .return_const(());
    events
        .expect_publish()
        .withf(|event| {
            event.topic == BoundsTopic::Changed
                && event.window == window("a")
                && event.payload.right == 90
                && event.payload.reason == EventReason::Group
        })
        .times(1)
        .return_const(());

    let mut scheduler = MockScheduler::new();
    scheduler
        .expect_start()
        .withf(|_, interval| *interval == Duration::from_millis(16))
        .times(1)
        .return_const(());
    scheduler.expect_stop().times(1).return_const(());

    let host = HostBindings::new(Arc::new(applier), Arc::new(events), Arc::new(scheduler));
    let mut group = group_with(
        host,
        &[("a", rect(0, 0, 100, 100)), ("b", rect(100, 0, 100, 100))],
    );
    let b = window("b");

    let outcome = group
        .bounds_changing(&b, changing(rect(90, 0, 110, 100), ChangeType::Size))
        .unwrap();
    assert_eq!(
        outcome.result().map(|result| result.leader),
        Some(rect(90, 0, 110, 100))
    );

    assert_eq!(group.end_interaction(&b).unwrap(), MoveOutcome::Unchanged);
    assert!(group.is_idle());
    assert_eq!(group.member(&window("a")).map(|m| m.rect), Some(rect(0, 0, 90, 100)));
}

#[test]
fn pushed_neighbour_is_clamped_to_the_floor_and_loses_its_edge() {
    let initial = vec![rect(0, 0, 100, 100), rect(100, 0, 100, 100)];
    let proposal = MovePropagator::default().propagate(
        0,
        &initial,
        RectDelta::new(0, 0, 80, 0),
        ChangeType::Size,
    );
    let after = match proposal {
        Proposal::Accepted(rects) => rects,
        other => panic!("unexpected proposal {:?}", other),
    };
    assert_eq!(after, vec![rect(0, 0, 180, 100), rect(162, 0, 38, 100)]);

    let checker = GraphInvariantChecker::new(DEFAULT_TOLERANCE_PX);
    assert!(!checker.is_valid_transition(&initial, &after, DistanceRule::Exact));
}

#[test]
fn squeezing_a_follower_below_the_floor_is_rejected() {
    let mut applier = MockApplier::new();
    applier.expect_apply().never();
    let mut events = MockEvents::new();
    events.expect_publish().never();
    let mut scheduler = MockScheduler::new();
    scheduler.expect_start().times(1).return_const(());
    scheduler.expect_stop().times(1).return_const(());

    let host = HostBindings::new(Arc::new(applier), Arc::new(events), Arc::new(scheduler));
    let mut group = group_with(
        host,
        &[
            ("top", rect(0, 0, 100, 100)),
            ("middle", rect(0, 100, 100, 50)),
            ("bottom", rect(0, 150, 100, 100)),
        ],
    );
    let top = window("top");

    let outcome = group
        .bounds_changing(&top, changing(rect(0, 0, 100, 140), ChangeType::Size))
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Rejected(RejectReason::TopologyBroken));
    assert_eq!(
        group.member(&window("middle")).map(|m| m.rect),
        Some(rect(0, 100, 100, 50))
    );

    group.end_interaction(&top).unwrap();
}

#[test]
fn combined_change_lands_the_leader_on_the_request() {
    let recorded = Recorded::new();
    let mut group = group_with(
        recorded.host(),
        &[("a", rect(0, 0, 100, 100)), ("b", rect(100, 0, 100, 100))],
    );
    let requested = rect(150, 20, 110, 100);

    let outcome = group
        .set_bounds(
            &window("b"),
            PartialBounds {
                x: Some(150),
                y: Some(20),
                width: Some(110),
                height: None,
            },
        )
        .unwrap();

    let result = outcome.result().expect("combined move accepted");
    assert_eq!(result.change_type, ChangeType::PositionAndSize);
    assert_eq!(result.leader, requested);
    assert_eq!(result.move_for(&window("b")).map(|mv| mv.rect), Some(requested));
    assert_eq!(
        result.move_for(&window("a")).map(|mv| mv.rect),
        Some(rect(60, 20, 90, 100))
    );

    let events = recorded.events.take();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.topic == BoundsTopic::Changed));
}

#[test]
fn frame_offsets_are_applied_both_ways() {
    let recorded = Recorded::new();
    let mut group =
        GroupMoveOrchestrator::new(Uuid::new_v4(), EngineConfig::default(), recorded.host());
    group
        .add_member(
            GroupMember::new(window("a"), rect(0, 0, 100, 100))
                .with_offset(RectDelta::new(-5, -5, 10, 10)),
        )
        .unwrap();
    group
        .add_member(GroupMember::new(window("b"), rect(100, 0, 100, 100)))
        .unwrap();

    group
        .bounds_changing(&window("a"), changing(rect(5, -5, 110, 110), ChangeType::Position))
        .unwrap();

    assert_eq!(group.member(&window("a")).map(|m| m.rect), Some(rect(10, 0, 100, 100)));
    let a_events = recorded.events.events_for(&window("a"));
    assert_eq!(a_events[0].payload.left, 5);
    assert_eq!(a_events[0].payload.reason, EventReason::Own);
    let b_events = recorded.events.events_for(&window("b"));
    assert_eq!(b_events[0].payload.left, 110);
}

#[test]
fn only_the_latest_notification_survives_until_the_tick() {
    let recorded = Recorded::new();
    let mut group = group_with(
        recorded.host(),
        &[("a", rect(0, 0, 100, 100)), ("b", rect(0, 100, 100, 100))],
    );
    let a = window("a");

    group
        .bounds_changing(&a, changing(rect(0, 10, 100, 100), ChangeType::Position))
        .unwrap();
    for y in [20, 30, 40] {
        let outcome = group
            .bounds_changing(&a, changing(rect(0, y, 100, 100), ChangeType::Position))
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Coalesced);
    }
    assert_eq!(
        group
            .bounds_changing(&window("b"), changing(rect(0, 500, 100, 100), ChangeType::Position))
            .unwrap(),
        MoveOutcome::Unchanged
    );

    group.tick().unwrap();
    assert_eq!(group.member(&window("b")).map(|m| m.rect), Some(rect(0, 140, 100, 100)));
    assert_eq!(recorded.applier.batch_count(), 2);
    assert!(recorded.scheduler.is_active(group.id()));

    assert_eq!(group.end_interaction(&window("b")).unwrap(), MoveOutcome::Unchanged);
    assert_eq!(group.state(), OrchestratorState::TransactionOpen { leader: a.clone() });
    group.end_interaction(&a).unwrap();
    assert!(!recorded.scheduler.is_active(group.id()));
}

#[test]
fn failing_host_keeps_members_where_they_were() {
    let mut applier = MockApplier::new();
    applier
        .expect_apply()
        .returning(|_| Err(anyhow::anyhow!("window is gone")));
    let recorded = Recorded::new();
    let host = HostBindings::new(
        Arc::new(applier),
        recorded.events.clone(),
        recorded.scheduler.clone(),
    );
    let mut group = group_with(
        host,
        &[("a", rect(0, 0, 100, 100)), ("b", rect(100, 0, 100, 100))],
    );

    let result = group.update_bounds(
        &window("a"),
        PartialBounds {
            x: Some(10),
            ..Default::default()
        },
    );
    assert!(result.is_err());
    assert_eq!(group.member(&window("b")).map(|m| m.rect), Some(rect(100, 0, 100, 100)));
    assert!(recorded.events.events().is_empty());
}

mod registry {
    use super::*;

    fn registry(recorded: &Recorded) -> GroupRegistry {
        GroupRegistry::new(EngineConfig::default(), recorded.host())
    }

    #[test]
    fn windows_joining_mid_gesture_become_routable_afterwards() {
        let recorded = Recorded::new();
        let mut registry = registry(&recorded);
        let a = window("a");
        let id = registry
            .join(GroupMember::new(a.clone(), rect(0, 0, 100, 100)), None)
            .unwrap();

        registry
            .bounds_changing(&a, changing(rect(5, 0, 100, 100), ChangeType::Position))
            .unwrap();
        registry
            .join(GroupMember::new(window("c"), rect(105, 0, 100, 100)), Some(id))
            .unwrap();

        let err = registry
            .bounds_changing(&window("c"), changing(rect(0, 0, 100, 100), ChangeType::Position))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DockGroupError>(),
            Some(DockGroupError::WindowNotFound(_))
        ));

        registry.end_interaction(&a).unwrap();
        assert_eq!(registry.group_of(&window("c")), Some(id));
        assert_eq!(registry.group(id).map(|group| group.members().len()), Some(2));
    }

    #[test]
    fn groups_are_independent() {
        let recorded = Recorded::new();
        let mut registry = registry(&recorded);
        let first = registry
            .join(GroupMember::new(window("a"), rect(0, 0, 100, 100)), None)
            .unwrap();
        let second = registry
            .join(GroupMember::new(window("b"), rect(100, 0, 100, 100)), None)
            .unwrap();
        assert_ne!(first, second);

        registry
            .update_bounds(
                &window("a"),
                PartialBounds {
                    width: Some(10),
                    ..Default::default()
                },
            )
            .unwrap();
        let second_group = registry.group(second).unwrap();
        assert_eq!(
            second_group.member(&window("b")).map(|m| m.rect),
            Some(rect(100, 0, 100, 100))
        );
    }

    #[test]
    fn duplicate_join_is_refused() {
        let recorded = Recorded::new();
        let mut registry = registry(&recorded);
        let id = registry
            .join(GroupMember::new(window("a"), rect(0, 0, 10, 10)), None)
            .unwrap();
        assert!(registry
            .join(GroupMember::new(window("a"), rect(0, 0, 10, 10)), Some(id))
            .is_err());
    }

    #[tokio::test]
    async fn tokio_ticks_drain_coalesced_updates() {
        let (scheduler, mut ticks) = TokioTickScheduler::from_current().unwrap();
        let scheduler = Arc::new(scheduler);
        let applier = Arc::new(RecordingBoundsApplier::new());
        let host = HostBindings::new(
            applier.clone(),
            Arc::new(RecordingEventSink::new()),
            scheduler.clone(),
        );
        let mut registry = GroupRegistry::new(EngineConfig::default(), host);
        let a = window("a");
        let id = registry
            .join(GroupMember::new(a.clone(), rect(0, 0, 100, 100)), None)
            .unwrap();
        registry
            .join(GroupMember::new(window("b"), rect(100, 0, 100, 100)), Some(id))
            .unwrap();

        registry
            .bounds_changing(&a, changing(rect(5, 0, 100, 100), ChangeType::Position))
            .unwrap();
        assert_eq!(
            registry
                .bounds_changing(&a, changing(rect(9, 0, 100, 100), ChangeType::Position))
                .unwrap(),
            MoveOutcome::Coalesced
        );

        let due = ticks.recv().await.unwrap();
        assert_eq!(due, id);
        let outcome = registry.tick(due).unwrap();
        assert_eq!(
            outcome.result().map(|result| result.leader),
            Some(rect(9, 0, 100, 100))
        );

        registry.end_interaction(&a).unwrap();
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(applier.batch_count(), 2);
    }
}
