use glam::Vec2;

use crate::types::*;

/// A movable, collidable object owned by a room.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub position: Vec2,
    /// Position at the end of the previous frame.
    pub previous: Vec2,
    /// Bounding box relative to `position`.
    pub bbox: Rect,
    /// Indexed and detectable by collision queries at all.
    pub tangible: bool,
    /// Actively checks for collisions and receives their events.
    pub checks_collisions: bool,
    pub mode: CollisionMode,
    /// Frame currently displayed, if any.
    pub visual: Option<VisualFrame>,
    pub class: Option<ClassId>,
    /// Optional user key echoed in events.
    pub user_key: Option<ColKey>,
}

impl Entity {
    /// Tangible, non-checking rectangle entity with no visual frame.
    pub fn new(position: Vec2, bbox: Rect) -> Self {
        Self {
            position,
            previous: position,
            bbox,
            tangible: true,
            checks_collisions: false,
            mode: CollisionMode::Rectangle,
            visual: None,
            class: None,
            user_key: None,
        }
    }

    pub fn with_checks_collisions(mut self, checks: bool) -> Self {
        self.checks_collisions = checks;
        self
    }

    pub fn with_tangible(mut self, tangible: bool) -> Self {
        self.tangible = tangible;
        self
    }

    pub fn with_mode(mut self, mode: CollisionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_visual(mut self, visual: VisualFrame) -> Self {
        self.visual = Some(visual);
        self
    }

    pub fn with_class(mut self, class: ClassId) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_user_key(mut self, key: ColKey) -> Self {
        self.user_key = Some(key);
        self
    }

    pub fn with_previous(mut self, previous: Vec2) -> Self {
        self.previous = previous;
        self
    }

    /// Bounding box in room coordinates if the entity stood at `position`.
    pub fn bbox_at(&self, position: Vec2) -> Rect {
        self.bbox.translate(position)
    }

    pub fn current_bbox(&self) -> Rect {
        self.bbox_at(self.position)
    }

    pub fn previous_bbox(&self) -> Rect {
        self.bbox_at(self.previous)
    }

    /// Area used to index the entity: its box widened to the drawn frame,
    /// then to the whole pixels its collision masks can occupy.
    pub fn footprint(&self) -> Rect {
        self.footprint_at(self.position)
    }

    pub fn footprint_at(&self, position: Vec2) -> Rect {
        let bbox = self.bbox_at(position);
        if !bbox.is_valid() {
            return bbox;
        }
        let drawn = match &self.visual {
            Some(visual) => bbox.union(visual.placement(position)),
            None => bbox,
        };
        drawn.pixel_cover()
    }
}
