use glam::Vec2;
use rustc_hash::FxHashSet;

use crate::error::ConfigError;
use crate::mask::Mask;
use crate::types::*;

/// Public API contract for the broad-phase object area index.
pub trait SpatialIndexApi {
    // --- Membership --------------------------------------------------------

    /// Record `footprint` as the entity's current extent and reconcile the
    /// cells (and void) that reference it. Works for never-indexed entities.
    fn insert_or_update(&mut self, id: EntityId, footprint: Rect);

    /// Drop the entity from every cell and the void. Idempotent.
    fn remove(&mut self, id: EntityId);

    // --- Queries -----------------------------------------------------------

    /// Entities whose recorded areas intersect the areas of `rect`.
    /// Conservative: callers must re-test the returned entities.
    fn query_rect(&self, rect: Rect) -> FxHashSet<EntityId>;

    // --- Shape -------------------------------------------------------------

    /// Change the room or object area size and rebuild every membership.
    fn resize(
        &mut self,
        room_width: f32,
        room_height: f32,
        cell_width: f32,
        cell_height: f32,
    ) -> Result<(), ConfigError>;
}

/// Narrowphase primitive tests.
pub trait NarrowphaseApi {
    /// Strict box overlap; touching edges do not collide.
    fn rectangles_collide(a: Rect, b: Rect) -> bool;

    /// Intersection of two boxes, if it has area.
    fn overlap_rect(a: Rect, b: Rect) -> Option<Rect>;

    /// Whether any pixel is solid in both masks placed with their top-left
    /// corners at `pos_a` and `pos_b`.
    fn masks_collide(pos_a: Vec2, a: &Mask, pos_b: Vec2, b: &Mask) -> bool;
}

/// Source of per-pixel opacity for sprite frames (owned by the animation
/// subsystem). Masks are unscaled and unrotated; the engine applies the
/// entity's [`Transform`] itself.
pub trait MaskProvider {
    /// Opacity mask for one frame, or `None` if the frame is unavailable.
    fn opacity_mask(&self, sprite: SpriteKey, frame: u32) -> Option<Mask>;
}

impl<F> MaskProvider for F
where
    F: Fn(SpriteKey, u32) -> Option<Mask>,
{
    fn opacity_mask(&self, sprite: SpriteKey, frame: u32) -> Option<Mask> {
        self(sprite, frame)
    }
}
