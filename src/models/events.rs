use super::window::{ChangeType, GroupMoveResult, WindowRef};
use crate::geometry::Rectangle;
use crate::Result;
use serde::Serialize;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Why a window's bounds changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventReason {
    /// The window itself was moved or resized
    #[serde(rename = "self")]
    Own,
    /// The window followed another member of its group
    Group,
}

/// Topic a bounds event is published under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoundsTopic {
    #[serde(rename = "bounds-changing")]
    Changing,
    #[serde(rename = "bounds-changed")]
    Changed,
}

impl BoundsTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            BoundsTopic::Changing => "bounds-changing",
            BoundsTopic::Changed => "bounds-changed",
        }
    }
}

/// Payload published for one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundsEventPayload {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub change_type: ChangeType,
    pub reason: EventReason,
    pub deferred: bool,
}

impl BoundsEventPayload {
    pub fn new(
        bounds: &Rectangle,
        change_type: ChangeType,
        reason: EventReason,
        deferred: bool,
    ) -> Self {
        Self {
            left: bounds.left(),
            top: bounds.top(),
            right: bounds.right(),
            bottom: bounds.bottom(),
            change_type,
            reason,
            deferred,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundsEvent {
    pub window: WindowRef,
    pub topic: BoundsTopic,
    pub payload: BoundsEventPayload,
}

impl BoundsEvent {
    /// A deferred event emitted while the gesture is still running
    pub fn changing(
        window: WindowRef,
        bounds: &Rectangle,
        change_type: ChangeType,
        reason: EventReason,
    ) -> Self {
        Self {
            window,
            topic: BoundsTopic::Changing,
            payload: BoundsEventPayload::new(bounds, change_type, reason, true),
        }
    }

    /// A final event emitted once a move is settled
    pub fn changed(
        window: WindowRef,
        bounds: &Rectangle,
        change_type: ChangeType,
        reason: EventReason,
    ) -> Self {
        Self {
            window,
            topic: BoundsTopic::Changed,
            payload: BoundsEventPayload::new(bounds, change_type, reason, false),
        }
    }
}

/// Host event bus
pub trait EventSink: Send + Sync {
    fn publish(&self, event: BoundsEvent);
}

/// Host side that turns an accepted result into native window bounds
pub trait BoundsApplier: Send + Sync {
    /// Apply every move of `result` as one batch
    fn apply(&self, result: &GroupMoveResult) -> Result<()>;
}

/// Keeps every published event in memory
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<BoundsEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BoundsEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<BoundsEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn events_for(&self, window: &WindowRef) -> Vec<BoundsEvent> {
        self.events()
            .into_iter()
            .filter(|event| &event.window == window)
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: BoundsEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Writes each event as one JSON line to stdout
#[derive(Debug, Default)]
pub struct JsonLinesEventSink;

impl EventSink for JsonLinesEventSink {
    fn publish(&self, event: BoundsEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                if let Err(err) = writeln!(handle, "{}", line) {
                    debug!("Dropping bounds event for {}: {}", event.window, err);
                }
            }
            Err(err) => debug!("Failed to serialize bounds event for {}: {}", event.window, err),
        }
    }
}

/// Applier that only logs what a native host would do
#[derive(Debug, Default)]
pub struct LoggingBoundsApplier;

impl BoundsApplier for LoggingBoundsApplier {
    fn apply(&self, result: &GroupMoveResult) -> Result<()> {
        for mv in &result.moves {
            info!(window = %mv.window, bounds = %mv.external_bounds(), "Applying bounds");
        }
        Ok(())
    }
}

/// Applier that remembers every batch it was handed
#[derive(Debug, Default)]
pub struct RecordingBoundsApplier {
    applied: Mutex<Vec<GroupMoveResult>>,
}

impl RecordingBoundsApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<GroupMoveResult> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn batch_count(&self) -> usize {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl BoundsApplier for RecordingBoundsApplier {
    fn apply(&self, result: &GroupMoveResult) -> Result<()> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_with_host_field_names() {
        let event = BoundsEvent::changing(
            WindowRef::new("app", "a"),
            &Rectangle::new(10, 20, 100, 50),
            ChangeType::Size,
            EventReason::Own,
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["topic"], "bounds-changing");
        assert_eq!(json["payload"]["right"], 110);
        assert_eq!(json["payload"]["bottom"], 70);
        assert_eq!(json["payload"]["changeType"], 1);
        assert_eq!(json["payload"]["reason"], "self");
        assert_eq!(json["payload"]["deferred"], true);
    }

    #[test]
    fn recording_sink_take_drains() {
        let sink = RecordingEventSink::new();
        let window = WindowRef::new("app", "b");
        sink.publish(BoundsEvent::changed(
            window.clone(),
            &Rectangle::new(0, 0, 1, 1),
            ChangeType::Position,
            EventReason::Group,
        ));

        assert_eq!(sink.events_for(&window).len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }
}
