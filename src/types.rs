use glam::Vec2;
use slotmap::new_key_type;

use crate::direction::Direction;

new_key_type! {
    /// Generational handle of an entity inside a [`Room`](crate::room::Room).
    pub struct EntityId;
}

/// User-defined opaque key carried through events (e.g., pack your object handle).
pub type ColKey = u64;

/// Caller-defined entity class, matched by [`Filter::Class`](crate::filter::Filter::Class).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub u32);

/// Identity of a sprite owned by the animation subsystem.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteKey(pub u64);

/// Axis-aligned rectangle in room pixels (top-left origin, y grows downward).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    #[inline]
    pub fn left(self) -> f32 {
        self.x
    }

    #[inline]
    pub fn right(self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn top(self) -> f32 {
        self.y
    }

    #[inline]
    pub fn bottom(self) -> f32 {
        self.y + self.h
    }

    pub fn min(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(self) -> Vec2 {
        Vec2::new(self.right(), self.bottom())
    }

    pub fn translate(self, by: Vec2) -> Self {
        Self::new(self.x + by.x, self.y + by.y, self.w, self.h)
    }

    /// True when the rectangle has no area (zero, negative or NaN extent).
    pub fn is_degenerate(self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    /// Finite coordinates and non-negative extents.
    pub fn is_valid(self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
            && self.w >= 0.0
            && self.h >= 0.0
    }

    /// Smallest rectangle containing both.
    pub fn union(self, other: Rect) -> Rect {
        Rect::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }

    /// Grown to contain any mask placed at `round(min)` with `round(w) x
    /// round(h)` pixels, as well as the rectangle itself.
    pub fn pixel_cover(self) -> Rect {
        Rect::from_min_max(self.min().min(self.min().round()), self.max() + Vec2::ONE)
    }
}

/// How an entity's shape is tested in the narrow phase.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollisionMode {
    /// Bounding box only.
    #[default]
    Rectangle,
    /// Ellipse inscribed in the bounding box.
    Ellipse,
    /// Per-pixel opacity of the current visual frame.
    Precise,
}

/// Scale and rotation applied to a sprite frame when it is drawn.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    /// Horizontal scale; negative flips the image horizontally.
    pub xscale: f32,
    /// Vertical scale; negative flips the image vertically.
    pub yscale: f32,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            xscale: 1.0,
            yscale: 1.0,
            rotation: 0.0,
        }
    }
}

/// Reference to the frame an entity currently displays.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VisualFrame {
    pub sprite: SpriteKey,
    pub frame: u32,
    /// Unscaled frame width in pixels.
    pub width: u32,
    /// Unscaled frame height in pixels.
    pub height: u32,
    /// Sprite origin in unscaled frame pixels; drawn at the entity position.
    pub origin: Vec2,
    pub transform: Transform,
}

/// Room-level settings for the object area grid.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoomConfig {
    pub width: f32,
    pub height: f32,
    /// Object area width; `None` uses the room width (a single column).
    pub cell_width: Option<f32>,
    /// Object area height; `None` uses the room height (a single row).
    pub cell_height: Option<f32>,
}

impl RoomConfig {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            cell_width: None,
            cell_height: None,
        }
    }

    pub fn with_cell_size(mut self, cell_width: f32, cell_height: f32) -> Self {
        self.cell_width = Some(cell_width);
        self.cell_height = Some(cell_height);
        self
    }

    /// Effective object area size, falling back to the room size.
    pub fn cell_size(&self) -> (f32, f32) {
        (
            self.cell_width.unwrap_or(self.width),
            self.cell_height.unwrap_or(self.height),
        )
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::new(640.0, 480.0)
    }
}

/// Collision notification for one participant of an overlapping pair.
///
/// Every resolved pair produces two of these: one addressed to each side,
/// with mirrored directions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CollisionEvent {
    /// Receiver of the notification.
    pub entity: EntityId,
    /// The entity it collided with.
    pub other: EntityId,
    /// Side the collision came from, from `entity`'s perspective.
    pub direction: Direction,
    pub entity_key: Option<ColKey>,
    pub other_key: Option<ColKey>,
}

/// Debug statistics for the object area grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GridStats {
    pub entities: usize,
    pub columns: u32,
    pub rows: u32,
    pub occupied_cells: usize,
    pub void_entities: usize,
    /// Sum of memberships over all cells and the void.
    pub memberships: usize,
}
