use crate::geometry::{RectDelta, Rectangle};
use crate::{DockGroupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a window group
pub type GroupId = Uuid;

/// Opaque reference to a host window, written `app/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowRef {
    /// Owning application identifier
    pub app_id: String,
    /// Window name, unique within the application
    pub name: String,
}

impl WindowRef {
    pub fn new(app_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_id, self.name)
    }
}

impl FromStr for WindowRef {
    type Err = DockGroupError;

    /// Parse the `app/name` form produced by `Display`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((app_id, name)) if !app_id.is_empty() && !name.is_empty() => {
                Ok(WindowRef::new(app_id, name))
            }
            _ => Err(DockGroupError::ValidationError(format!(
                "Window reference '{}' must look like 'app/name'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for WindowRef {
    type Error = DockGroupError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WindowRef> for String {
    fn from(window: WindowRef) -> String {
        window.to_string()
    }
}

/// Classification of a bounds change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChangeType {
    Position = 0,
    Size = 1,
    PositionAndSize = 2,
}

impl ChangeType {
    /// Classify the change implied by `delta`.
    ///
    /// A size change that also moves the origin only counts as a move when the
    /// origin shift is not fully explained by the opposite edge staying put.
    pub fn classify(delta: &RectDelta) -> ChangeType {
        let moved = (delta.x != 0 && delta.x + delta.width != 0)
            || (delta.y != 0 && delta.y + delta.height != 0);
        match (delta.resizes(), moved) {
            (true, true) => ChangeType::PositionAndSize,
            (true, false) => ChangeType::Size,
            (false, _) => ChangeType::Position,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ChangeType> for u8 {
    fn from(change_type: ChangeType) -> u8 {
        change_type.code()
    }
}

impl TryFrom<u8> for ChangeType {
    type Error = DockGroupError;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(ChangeType::Position),
            1 => Ok(ChangeType::Size),
            2 => Ok(ChangeType::PositionAndSize),
            other => Err(DockGroupError::InvalidChangeType(other)),
        }
    }
}

/// A window taking part in a group, with its current engine-space rectangle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub window: WindowRef,
    pub rect: Rectangle,
    /// Frame inset between engine coordinates and host-reported bounds
    #[serde(default)]
    pub offset: RectDelta,
}

impl GroupMember {
    pub fn new(window: WindowRef, rect: Rectangle) -> Self {
        Self {
            window,
            rect: rect.clamped(),
            offset: RectDelta::ZERO,
        }
    }

    pub fn with_offset(mut self, offset: RectDelta) -> Self {
        self.offset = offset;
        self
    }

    pub fn external_bounds(&self) -> Rectangle {
        self.rect.apply_offset(&self.offset)
    }
}

/// New rectangle for one group member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Move {
    pub window: WindowRef,
    pub rect: Rectangle,
    pub offset: RectDelta,
}

impl Move {
    /// Bounds to hand to the host window
    pub fn external_bounds(&self) -> Rectangle {
        self.rect.apply_offset(&self.offset)
    }
}

/// Accepted set of moves for one computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMoveResult {
    pub change_type: ChangeType,
    /// Final leader rectangle, equal to the requested one
    pub leader: Rectangle,
    /// Every member whose rectangle changed, in member order
    pub moves: Vec<Move>,
}

impl GroupMoveResult {
    pub fn move_for(&self, window: &WindowRef) -> Option<&Move> {
        self.moves.iter().find(|mv| &mv.window == window)
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Raw bounds a host reports while the user drags or resizes a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsChangingPayload {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Host tag: 0 = position, 1 = size, 2 = position and size
    #[serde(default)]
    pub change_type: u8,
}

impl BoundsChangingPayload {
    pub fn new(bounds: Rectangle, change_type: ChangeType) -> Self {
        Self {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            change_type: change_type.code(),
        }
    }

    pub fn bounds(&self) -> Rectangle {
        Rectangle::new(self.x, self.y, self.width, self.height)
    }

    pub fn change_type(&self) -> Result<ChangeType> {
        Ok(ChangeType::try_from(self.change_type)?)
    }
}

/// Bounds with every field optional, as accepted by API moves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBounds {
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
}

impl PartialBounds {
    /// Take the given fields from `self` and the rest from `base`
    pub fn fill(&self, base: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.x.unwrap_or(base.x),
            self.y.unwrap_or(base.y),
            self.width.unwrap_or(base.width),
            self.height.unwrap_or(base.height),
        )
    }

    /// Interpret the fields as a delta, missing ones being zero
    pub fn to_delta(&self) -> RectDelta {
        RectDelta::new(
            self.x.unwrap_or(0),
            self.y.unwrap_or(0),
            self.width.unwrap_or(0),
            self.height.unwrap_or(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_edge_drags_as_resize() {
        // dragging the left edge outwards: origin moves, right edge stays
        assert_eq!(
            ChangeType::classify(&RectDelta::new(-10, 0, 10, 0)),
            ChangeType::Size
        );
        assert_eq!(
            ChangeType::classify(&RectDelta::new(0, 0, 10, 0)),
            ChangeType::Size
        );
        assert_eq!(
            ChangeType::classify(&RectDelta::new(5, 5, 0, 0)),
            ChangeType::Position
        );
        assert_eq!(
            ChangeType::classify(&RectDelta::new(5, 0, 10, 0)),
            ChangeType::PositionAndSize
        );
    }

    #[test]
    fn change_type_codes() {
        assert_eq!(ChangeType::try_from(2).unwrap(), ChangeType::PositionAndSize);
        assert!(matches!(
            ChangeType::try_from(3),
            Err(DockGroupError::InvalidChangeType(3))
        ));
        assert_eq!(serde_json::to_string(&ChangeType::Size).unwrap(), "1");
    }

    #[test]
    fn window_ref_round_trips_through_display() {
        let window = WindowRef::new("app", "main");
        assert_eq!(window.to_string().parse::<WindowRef>().unwrap(), window);
        assert!("no-separator".parse::<WindowRef>().is_err());
    }

    #[test]
    fn partial_bounds_fill_and_delta() {
        let partial = PartialBounds {
            x: Some(5),
            height: Some(40),
            ..Default::default()
        };
        let base = Rectangle::new(1, 2, 3, 4);
        assert_eq!(partial.fill(&base), Rectangle::new(5, 2, 3, 40));
        assert_eq!(partial.to_delta(), RectDelta::new(5, 0, 0, 40));
    }

    #[test]
    fn member_external_bounds_apply_offset() {
        let member = GroupMember::new(WindowRef::new("app", "a"), Rectangle::new(10, 10, 100, 100))
            .with_offset(RectDelta::new(-7, 0, 14, 7));
        assert_eq!(member.external_bounds(), Rectangle::new(3, 10, 114, 107));
        assert_eq!(
            Rectangle::normalize_external(&member.external_bounds(), &member.offset),
            member.rect
        );
    }
}
