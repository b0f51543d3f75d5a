use serde::{Deserialize, Serialize};
use std::fmt;

/// Default distance, in pixels, within which two edges count as shared
pub const DEFAULT_TOLERANCE_PX: i32 = 5;

/// Default smallest width/height a follower may be squeezed to
pub const DEFAULT_MIN_DIMENSION_PX: i32 = 38;

/// One of the four sides of a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// All sides in the order shared bounds are reported
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field difference between two rectangles.
///
/// Also used as the frame-inset offset between engine coordinates and the
/// bounds a host window reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RectDelta {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
}

impl RectDelta {
    pub const ZERO: RectDelta = RectDelta::new(0, 0, 0, 0);

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn resizes(&self) -> bool {
        self.width != 0 || self.height != 0
    }
}

/// Parameters applied when a rectangle follows the edges of a moving leader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRules {
    /// Inclusive pixel distance for two edges to count as shared
    pub tolerance: i32,
    /// Floor applied to a width or height that shrank during the follow
    pub min_dimension: i32,
}

impl Default for EdgeRules {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE_PX,
            min_dimension: DEFAULT_MIN_DIMENSION_PX,
        }
    }
}

/// For each side of one rectangle, the side of another rectangle it lines up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SharedBounds {
    pub top: Option<Side>,
    pub right: Option<Side>,
    pub bottom: Option<Side>,
    pub left: Option<Side>,
}

impl SharedBounds {
    pub fn get(&self, side: Side) -> Option<Side> {
        match side {
            Side::Top => self.top,
            Side::Right => self.right,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
        }
    }

    fn set(&mut self, side: Side, matched: Option<Side>) {
        match side {
            Side::Top => self.top = matched,
            Side::Right => self.right = matched,
            Side::Bottom => self.bottom = matched,
            Side::Left => self.left = matched,
        }
    }

    pub fn has_shared_bounds(&self) -> bool {
        Side::ALL.iter().any(|side| self.get(*side).is_some())
    }

    /// Whether `side` lines up with some side of the other rectangle
    pub fn tracks(&self, side: Side) -> bool {
        self.get(side).is_some()
    }

    /// Matched `(own side, other side)` pairs in top, right, bottom, left order
    pub fn pairs(&self) -> Vec<(Side, Side)> {
        Side::ALL
            .iter()
            .filter_map(|side| self.get(*side).map(|other| (*side, other)))
            .collect()
    }
}

/// Axis-aligned window rectangle in pixel units.
///
/// Values are never mutated in place; every operation returns a new rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Coordinate of the given side
    pub fn edge(&self, side: Side) -> i32 {
        match side {
            Side::Top => self.top(),
            Side::Right => self.right(),
            Side::Bottom => self.bottom(),
            Side::Left => self.left(),
        }
    }

    /// Shift and size change needed to turn `self` into `other`
    pub fn delta(&self, other: &Rectangle) -> RectDelta {
        RectDelta::new(
            other.x - self.x,
            other.y - self.y,
            other.width - self.width,
            other.height - self.height,
        )
    }

    /// Translate by the positional part of `delta`; size fields are ignored
    pub fn shift(&self, delta: RectDelta) -> Rectangle {
        Rectangle::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }

    /// Apply every field of `delta`, moving opposing edges independently
    pub fn resize_by(&self, delta: RectDelta) -> Rectangle {
        Rectangle::new(
            self.x + delta.x,
            self.y + delta.y,
            self.width + delta.width,
            self.height + delta.height,
        )
    }

    /// Expand around the center by `dx` on each horizontal side and `dy` on each vertical side
    pub fn grow(&self, dx: i32, dy: i32) -> Rectangle {
        Rectangle::new(
            self.x - dx,
            self.y - dy,
            self.width + 2 * dx,
            self.height + 2 * dy,
        )
    }

    pub fn moved(&self, other: &Rectangle) -> bool {
        self != other
    }

    /// Strict overlap test; rectangles that only touch do not collide
    pub fn collides_with(&self, other: &Rectangle) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Inclusive overlap test after expanding both axes by `tolerance`
    pub fn is_near(&self, other: &Rectangle, tolerance: i32) -> bool {
        self.x - tolerance <= other.right()
            && other.x <= self.right() + tolerance
            && self.y - tolerance <= other.bottom()
            && other.y <= self.bottom() + tolerance
    }

    /// Gap between the two rectangles, zero when they touch or overlap
    pub fn gap_to(&self, other: &Rectangle) -> i32 {
        let gap_x = self.x.max(other.x) - self.right().min(other.right());
        let gap_y = self.y.max(other.y) - self.bottom().min(other.bottom());
        gap_x.max(gap_y).max(0)
    }

    /// Which of this rectangle's sides line up with a side of `other`.
    ///
    /// A side first tries the opposite side of `other` (edge-to-edge docking),
    /// then the same side (flush alignment). Nothing matches unless the two
    /// rectangles also overlap once expanded by `tolerance`.
    pub fn shared_bounds(&self, other: &Rectangle, tolerance: i32) -> SharedBounds {
        let mut shared = SharedBounds::default();
        if !self.is_near(other, tolerance) {
            return shared;
        }

        for side in Side::ALL {
            let position = self.edge(side);
            let opposite = side.opposite();
            let matched = if (position - other.edge(opposite)).abs() <= tolerance {
                Some(opposite)
            } else if (position - other.edge(side)).abs() <= tolerance {
                Some(side)
            } else {
                None
            };
            shared.set(side, matched);
        }

        shared
    }

    pub fn shared_bounds_list(&self, other: &Rectangle, tolerance: i32) -> Vec<(Side, Side)> {
        self.shared_bounds(other, tolerance).pairs()
    }

    /// Put `my_side` exactly on `other_side` of `other`, keeping the opposite edge fixed
    pub fn align_side(&self, my_side: Side, other: &Rectangle, other_side: Side) -> Rectangle {
        let position = other.edge(other_side);
        match my_side {
            Side::Left => Rectangle::new(position, self.y, self.right() - position, self.height),
            Side::Right => Rectangle::new(self.x, self.y, position - self.x, self.height),
            Side::Top => Rectangle::new(self.x, position, self.width, self.bottom() - position),
            Side::Bottom => Rectangle::new(self.x, self.y, self.width, position - self.y),
        }
    }

    /// Move one side by `by` pixels, keeping the opposite edge fixed
    pub fn move_side(&self, side: Side, by: i32) -> Rectangle {
        match side {
            Side::Left => Rectangle::new(self.x + by, self.y, self.width - by, self.height),
            Side::Right => Rectangle::new(self.x, self.y, self.width + by, self.height),
            Side::Top => Rectangle::new(self.x, self.y + by, self.width, self.height - by),
            Side::Bottom => Rectangle::new(self.x, self.y, self.width, self.height + by),
        }
    }

    /// Reposition this rectangle after a neighbouring leader moved from
    /// `leader_from` to `leader_to`.
    ///
    /// Sides that were shared with `leader_from` move by the same distance as
    /// the matching side of the leader, so a docking gap inside the tolerance
    /// is kept. All other sides stay where they are. A dimension that
    /// changed and dropped under `rules.min_dimension` is set to exactly the
    /// floor while the non-tracking edge stays fixed.
    pub fn follow_leader(
        &self,
        leader_from: &Rectangle,
        leader_to: &Rectangle,
        rules: &EdgeRules,
    ) -> Rectangle {
        let shared = self.shared_bounds(leader_from, rules.tolerance);
        if !shared.has_shared_bounds() {
            return *self;
        }

        let followed = shared
            .pairs()
            .into_iter()
            .fold(*self, |rect, (mine, theirs)| {
                rect.move_side(mine, leader_to.edge(theirs) - leader_from.edge(theirs))
            });

        let (x, width) = clamp_axis(
            followed.x,
            followed.width,
            self.width,
            shared.tracks(Side::Left),
            shared.tracks(Side::Right),
            rules.min_dimension,
        );
        let (y, height) = clamp_axis(
            followed.y,
            followed.height,
            self.height,
            shared.tracks(Side::Top),
            shared.tracks(Side::Bottom),
            rules.min_dimension,
        );
        let result = Rectangle::new(x, y, width, height);

        // An edge that was not shared with the leader must never move.
        let untracked_edit = Side::ALL
            .iter()
            .any(|side| !shared.tracks(*side) && result.edge(*side) != self.edge(*side));
        if untracked_edit {
            return *self;
        }

        result
    }

    /// Same rectangle with negative width/height raised to zero
    pub fn clamped(&self) -> Rectangle {
        Rectangle::new(self.x, self.y, self.width.max(0), self.height.max(0))
    }

    /// Bounds as seen by the host, with the frame offset applied
    pub fn apply_offset(&self, offset: &RectDelta) -> Rectangle {
        self.resize_by(*offset)
    }

    /// Engine coordinates for bounds the host reported with `offset` applied
    pub fn normalize_external(external: &Rectangle, offset: &RectDelta) -> Rectangle {
        Rectangle::new(
            external.x - offset.x,
            external.y - offset.y,
            external.width - offset.width,
            external.height - offset.height,
        )
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Floor one axis of a followed rectangle. Returns the new `(start, length)`.
fn clamp_axis(
    start: i32,
    length: i32,
    original_length: i32,
    start_tracks: bool,
    end_tracks: bool,
    min_dimension: i32,
) -> (i32, i32) {
    let floor = if length != original_length {
        min_dimension
    } else {
        0
    };
    if length >= floor {
        return (start, length);
    }

    if start_tracks && !end_tracks {
        (start + length - floor, floor)
    } else {
        (start, floor)
    }
}
