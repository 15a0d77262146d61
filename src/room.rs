use std::rc::Rc;

use glam::Vec2;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::api::{MaskProvider, NarrowphaseApi, SpatialIndexApi};
use crate::direction::{Direction, classify};
use crate::entity::Entity;
use crate::error::{ConfigError, MaskError};
use crate::filter::Filter;
use crate::grid::ObjectAreaGrid;
use crate::mask::{Mask, MaskCache, pixels};
use crate::narrowphase::Narrowphase;
use crate::types::*;

/// A room: entity arena, object area grid and mask cache.
///
/// All mutation goes through `&mut Room`, which keeps the grid in step with
/// every entity's footprint. Collision events are buffered by
/// [`Room::resolve_collisions`] and read with [`Room::drain_events`].
pub struct Room {
    cfg: RoomConfig,
    entities: SlotMap<EntityId, Entity>,
    grid: ObjectAreaGrid,
    masks: MaskCache,
    provider: Box<dyn MaskProvider>,

    // Event buffer for the last resolution pass(es)
    events: Vec<CollisionEvent>,
}

/// Narrow-phase geometry of an entity or query shape.
enum Probe {
    Box(Rect),
    Mask { at: Vec2, mask: Rc<Mask> },
}

impl Probe {
    /// Room area the probe can touch once placed on whole pixels.
    fn area(&self) -> Rect {
        match self {
            Probe::Box(r) => r.pixel_cover(),
            Probe::Mask { at, mask } => {
                let at = at.round();
                Rect::new(at.x, at.y, mask.width() as f32, mask.height() as f32)
            }
        }
    }
}

impl Room {
    pub fn new(cfg: RoomConfig, provider: impl MaskProvider + 'static) -> Result<Self, ConfigError> {
        let grid = ObjectAreaGrid::from_config(&cfg)?;
        Ok(Self {
            cfg,
            entities: SlotMap::with_key(),
            grid,
            masks: MaskCache::new(),
            provider: Box::new(provider),
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.cfg
    }

    pub fn grid(&self) -> &ObjectAreaGrid {
        &self.grid
    }

    pub fn masks(&self) -> &MaskCache {
        &self.masks
    }

    // --- Entities ---------------------------------------------------------

    pub fn add(&mut self, entity: Entity) -> EntityId {
        let id = self.entities.insert(entity);
        self.reindex(id);
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.grid.remove(id);
        self.entities.remove(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Mutate an entity, then bring the grid up to date with its footprint.
    pub fn modify<R>(&mut self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        let out = f(self.entities.get_mut(id)?);
        self.reindex(id);
        Some(out)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) -> bool {
        self.modify(id, |e| e.position = position).is_some()
    }

    /// End of step: every entity's current position becomes its previous one.
    pub fn finish_frame(&mut self) {
        for e in self.entities.values_mut() {
            e.previous = e.position;
        }
    }

    // --- Settings ---------------------------------------------------------

    pub fn set_cell_size(&mut self, cell_width: f32, cell_height: f32) -> Result<(), ConfigError> {
        let cfg = self.cfg.with_cell_size(cell_width, cell_height);
        self.apply_config(cfg)
    }

    pub fn set_room_size(&mut self, width: f32, height: f32) -> Result<(), ConfigError> {
        let cfg = RoomConfig {
            width,
            height,
            ..self.cfg
        };
        self.apply_config(cfg)
    }

    /// Drop cached precise masks of a sprite whose pixels changed.
    pub fn invalidate_sprite(&mut self, sprite: SpriteKey) {
        self.masks.invalidate_sprite(sprite);
    }

    /// Swap the opacity source; every cached mask is dropped.
    pub fn set_mask_provider(&mut self, provider: impl MaskProvider + 'static) {
        self.provider = Box::new(provider);
        self.masks.clear();
    }

    // --- Queries ----------------------------------------------------------

    /// Broad-phase candidates for an area, sorted. Not re-tested.
    pub fn objects_at(&self, rect: Rect) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self.grid.query_rect(rect).into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Whether `a` (optionally moved to `at`) and `b` overlap. Never mutates.
    pub fn overlaps(&self, a: EntityId, b: EntityId, at: Option<Vec2>) -> bool {
        let (Some(ea), Some(eb)) = (self.entities.get(a), self.entities.get(b)) else {
            return false;
        };
        let pos_a = at.unwrap_or(ea.position);
        self.entities_overlap(a, ea, pos_a, b, eb)
    }

    /// Tangible entities colliding with `id` if it stood at `at` (its own
    /// position by default), sorted. Empty for intangible entities.
    pub fn collision(&self, id: EntityId, filter: Filter<'_>, at: Option<Vec2>) -> Vec<EntityId> {
        let Some(e) = self.entities.get(id).filter(|e| e.tangible) else {
            return Vec::new();
        };
        let position = at.unwrap_or(e.position);
        let footprint = e.footprint_at(position);
        if !footprint.is_valid() {
            return Vec::new();
        }
        self.objects_at(footprint)
            .into_iter()
            .filter(|&other| other != id)
            .filter(|&other| {
                let eo = &self.entities[other];
                filter.matches(other, eo) && self.entities_overlap(id, e, position, other, eo)
            })
            .collect()
    }

    pub fn collide_rectangle(&self, rect: Rect, filter: Filter<'_>) -> Vec<EntityId> {
        if rect.is_degenerate() {
            return Vec::new();
        }
        self.collide_probe(&Probe::Box(rect), filter)
    }

    /// Entities overlapping the ellipse inscribed in `rect`.
    pub fn collide_ellipse(&self, rect: Rect, filter: Filter<'_>) -> Vec<EntityId> {
        let (w, h) = (pixels(rect.w), pixels(rect.h));
        if w == 0 || h == 0 || !rect.is_valid() {
            return Vec::new();
        }
        let probe = Probe::Mask {
            at: rect.min(),
            mask: self.masks.ellipse(w, h),
        };
        self.collide_probe(&probe, filter)
    }

    pub fn collide_circle(&self, center: Vec2, radius: f32, filter: Filter<'_>) -> Vec<EntityId> {
        let rect = Rect::new(center.x - radius, center.y - radius, radius * 2.0, radius * 2.0);
        self.collide_ellipse(rect, filter)
    }

    /// Entities crossed by the one-pixel line from `p1` to `p2`.
    pub fn collide_line(&self, p1: Vec2, p2: Vec2, filter: Filter<'_>) -> Vec<EntityId> {
        let bounds = Rect::from_min_max(p1.min(p2), p1.max(p2));
        if !bounds.is_valid() {
            return Vec::new();
        }
        // Axis-aligned: just a thin box
        if bounds.w <= 1.0 || bounds.h <= 1.0 {
            let thin = Rect::new(bounds.x, bounds.y, bounds.w.max(1.0), bounds.h.max(1.0));
            return self.collide_rectangle(thin, filter);
        }

        let origin = bounds.min().round();
        let local = |p: Vec2| {
            let q = p.round() - origin;
            (q.x as i32, q.y as i32)
        };
        let (from, to) = (local(p1), local(p2));
        let w = from.0.max(to.0) as u32 + 1;
        let h = from.1.max(to.1) as u32 + 1;
        let probe = Probe::Mask {
            at: origin,
            mask: self.masks.line(w, h, from, to),
        };
        self.collide_probe(&probe, filter)
    }

    // --- Resolution -------------------------------------------------------

    /// Dispatch every overlapping pair involving a collision-checking entity
    /// exactly once. Both participants get an event; returns how many were
    /// buffered.
    pub fn resolve_collisions(&mut self, filter: Filter<'_>) -> usize {
        let mut checkers: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.tangible && e.checks_collisions)
            .map(|(id, _)| id)
            .collect();
        checkers.sort_unstable();

        // Pending candidate lists, all built before any dispatch
        let mut pending: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
        for &id in &checkers {
            if !self.grid.contains(id) {
                log::debug!("entity {id:?} has no usable footprint; skipped this frame");
                continue;
            }
            if let Some(candidates) = self.grid.candidates_of(id) {
                pending.insert(id, candidates);
            }
        }

        let mut events = Vec::new();
        for a in checkers {
            let Some(others) = pending.remove(&a) else {
                continue;
            };
            for b in others {
                let eb = &self.entities[b];
                if !filter.matches(b, eb) {
                    continue;
                }
                if let Some(list) = pending.get_mut(&b)
                    && let Ok(i) = list.binary_search(&a)
                {
                    list.remove(i);
                }
                if let Some(direction) = self.pair_direction(a, b) {
                    self.pair_events(a, b, direction, &mut events);
                }
            }
        }

        let n = events.len();
        self.events.extend(events);
        n
    }

    /// Collision step for one entity; events come back instead of being
    /// buffered, and other entities' steps are unaffected.
    pub fn resolve_collisions_for(&self, id: EntityId, filter: Filter<'_>) -> Vec<CollisionEvent> {
        let mut events = Vec::new();
        let Some(e) = self.entities.get(id) else {
            return events;
        };
        if !e.tangible {
            return events;
        }
        let Some(candidates) = self.grid.candidates_of(id) else {
            return events;
        };
        for b in candidates {
            if !filter.matches(b, &self.entities[b]) {
                continue;
            }
            if let Some(direction) = self.pair_direction(id, b) {
                self.pair_events(id, b, direction, &mut events);
            }
        }
        events
    }

    pub fn drain_events(&mut self) -> Vec<CollisionEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Internals --------------------------------------------------------

    fn apply_config(&mut self, cfg: RoomConfig) -> Result<(), ConfigError> {
        let (cw, ch) = cfg.cell_size();
        self.grid.resize(cfg.width, cfg.height, cw, ch)?;
        self.cfg = cfg;
        Ok(())
    }

    fn reindex(&mut self, id: EntityId) {
        let Some(e) = self.entities.get(id) else {
            return;
        };
        if e.tangible {
            self.grid.insert_or_update(id, e.footprint());
        } else {
            self.grid.remove(id);
        }
    }

    /// Overlap of `a` and `b` from `a`'s previous-frame perspective.
    fn pair_direction(&self, a: EntityId, b: EntityId) -> Option<Direction> {
        let (ea, eb) = (&self.entities[a], &self.entities[b]);
        if !self.entities_overlap(a, ea, ea.position, b, eb) {
            return None;
        }
        let direction = classify(ea.previous_bbox(), eb.previous_bbox());
        log::trace!("collision {a:?} -> {b:?} from {direction:?}");
        Some(direction)
    }

    fn pair_events(&self, a: EntityId, b: EntityId, direction: Direction, out: &mut Vec<CollisionEvent>) {
        let (ka, kb) = (self.entities[a].user_key, self.entities[b].user_key);
        out.push(CollisionEvent {
            entity: a,
            other: b,
            direction,
            entity_key: ka,
            other_key: kb,
        });
        out.push(CollisionEvent {
            entity: b,
            other: a,
            direction: -direction,
            entity_key: kb,
            other_key: ka,
        });
    }

    fn entities_overlap(&self, a: EntityId, ea: &Entity, pos_a: Vec2, b: EntityId, eb: &Entity) -> bool {
        let any_precise = ea.mode == CollisionMode::Precise || eb.mode == CollisionMode::Precise;
        if !any_precise && !Narrowphase::rectangles_collide(ea.bbox_at(pos_a), eb.current_bbox()) {
            return false;
        }
        match (self.entity_probe(a, ea, pos_a), self.entity_probe(b, eb, eb.position)) {
            (Some(pa), Some(pb)) => self.probes_collide(&pa, &pb),
            _ => false,
        }
    }

    fn entity_probe(&self, id: EntityId, e: &Entity, position: Vec2) -> Option<Probe> {
        let bbox = e.bbox_at(position);
        if bbox.is_degenerate() {
            return None;
        }
        let probe = match e.mode {
            CollisionMode::Rectangle => Probe::Box(bbox),
            CollisionMode::Ellipse => Probe::Mask {
                at: bbox.min(),
                mask: self.masks.ellipse(pixels(bbox.w), pixels(bbox.h)),
            },
            CollisionMode::Precise => match self.precise_mask(e) {
                Ok((mask, origin)) => Probe::Mask {
                    at: position - origin,
                    mask,
                },
                Err(err) => {
                    log::warn!("entity {id:?}: {err}; falling back to its bounding box");
                    Probe::Box(bbox)
                }
            },
        };
        Some(probe)
    }

    fn precise_mask(&self, e: &Entity) -> Result<(Rc<Mask>, Vec2), MaskError> {
        let visual = e.visual.as_ref().ok_or(MaskError::NoVisualFrame)?;
        self.masks.precise(visual, self.provider.as_ref())
    }

    fn probes_collide(&self, a: &Probe, b: &Probe) -> bool {
        if let (Probe::Box(ra), Probe::Box(rb)) = (a, b) {
            return Narrowphase::rectangles_collide(*ra, *rb);
        }
        let (pa, ma) = self.probe_mask(a);
        let (pb, mb) = self.probe_mask(b);
        Narrowphase::masks_collide(pa, &ma, pb, &mb)
    }

    fn probe_mask(&self, probe: &Probe) -> (Vec2, Rc<Mask>) {
        match probe {
            Probe::Box(r) => (r.min(), self.masks.rectangle(pixels(r.w), pixels(r.h))),
            Probe::Mask { at, mask } => (*at, Rc::clone(mask)),
        }
    }

    fn collide_probe(&self, probe: &Probe, filter: Filter<'_>) -> Vec<EntityId> {
        self.objects_at(probe.area())
            .into_iter()
            .filter(|&id| {
                let e = &self.entities[id];
                filter.matches(id, e)
                    && self
                        .entity_probe(id, e, e.position)
                        .is_some_and(|p| self.probes_collide(probe, &p))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{NoMasks, SpriteMasks};
    use rustc_hash::FxHashSet;

    fn room() -> Room {
        Room::new(RoomConfig::new(200.0, 200.0).with_cell_size(32.0, 32.0), NoMasks).unwrap()
    }

    fn square(x: f32, y: f32, size: f32) -> Entity {
        Entity::new(Vec2::new(x, y), Rect::new(0.0, 0.0, size, size))
    }

    fn lcg(seed: &mut u32) -> u32 {
        *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        *seed >> 8
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert!(Room::new(RoomConfig::new(0.0, 10.0), NoMasks).is_err());
        let bad_cells = RoomConfig::new(10.0, 10.0).with_cell_size(f32::INFINITY, 1.0);
        assert!(matches!(
            Room::new(bad_cells, NoMasks),
            Err(ConfigError::CellSize { .. })
        ));
        let single = Room::new(RoomConfig::default(), NoMasks).unwrap();
        assert_eq!((single.grid().columns(), single.grid().rows()), (1, 1));
    }

    #[test]
    fn test_touching_boxes_do_not_collide() {
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 10.0).with_checks_collisions(true));
        let b = r.add(square(10.0, 0.0, 10.0));
        assert!(!r.overlaps(a, b, None));
        assert_eq!(r.resolve_collisions(Filter::Any), 0);

        r.set_position(b, Vec2::new(9.0, 0.0));
        assert!(r.overlaps(a, b, None));
        assert_eq!(r.resolve_collisions(Filter::Any), 2);
    }

    #[test]
    fn test_direction_from_previous_positions() {
        let mut r = room();
        let a = r.add(
            square(15.0, 0.0, 10.0)
                .with_previous(Vec2::new(0.0, 0.0))
                .with_checks_collisions(true),
        );
        let b = r.add(square(20.0, 0.0, 10.0));
        r.resolve_collisions(Filter::Any);
        let events = r.drain_events();
        assert_eq!(events.len(), 2);
        let for_a = events.iter().find(|e| e.entity == a).unwrap();
        let for_b = events.iter().find(|e| e.entity == b).unwrap();
        assert_eq!((for_a.other, for_a.direction), (b, Direction::new(1, 0)));
        assert_eq!((for_b.other, for_b.direction), (a, Direction::new(-1, 0)));
        assert!(r.drain_events().is_empty());
    }

    #[test]
    fn test_continuous_collision() {
        let mut r = room();
        r.add(square(5.0, 5.0, 10.0).with_checks_collisions(true));
        r.add(square(8.0, 8.0, 10.0));
        r.resolve_collisions(Filter::Any);
        let events = r.drain_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.direction.is_continuous()));
    }

    #[test]
    fn test_events_carry_user_keys() {
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 10.0).with_checks_collisions(true).with_user_key(11));
        r.add(square(5.0, 0.0, 10.0).with_user_key(22));
        let events = r.resolve_collisions_for(a, Filter::Any);
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].entity_key, events[0].other_key), (Some(11), Some(22)));
        assert_eq!((events[1].entity_key, events[1].other_key), (Some(22), Some(11)));
        // Not buffered
        assert!(r.drain_events().is_empty());
    }

    #[test]
    fn test_pair_dispatched_once_when_both_check() {
        let mut r = room();
        let ids: Vec<EntityId> = (0..3)
            .map(|i| r.add(square(i as f32 * 2.0, 0.0, 10.0).with_checks_collisions(true)))
            .collect();
        assert_eq!(r.resolve_collisions(Filter::Any), 6);
        let events = r.drain_events();
        let mut seen = FxHashSet::default();
        for ev in &events {
            assert!(seen.insert((ev.entity, ev.other)), "duplicate {ev:?}");
        }
        for &a in &ids {
            for &b in &ids {
                if a != b {
                    assert!(seen.contains(&(a, b)));
                }
            }
        }
    }

    #[test]
    fn test_filter_rejected_pair_is_left_to_the_other_side() {
        let mut r = room();
        let ball = r.add(square(0.0, 0.0, 10.0).with_checks_collisions(true).with_class(ClassId(1)));
        let paddle = r.add(square(5.0, 0.0, 10.0).with_checks_collisions(true).with_class(ClassId(2)));
        let wall = r.add(square(5.0, 5.0, 10.0));
        assert_eq!(r.resolve_collisions(Filter::Class(ClassId(1))), 2);
        let events = r.drain_events();
        assert!(events.iter().any(|e| e.entity == paddle && e.other == ball));
        assert!(events.iter().all(|e| e.entity != wall && e.other != wall));
    }

    #[test]
    fn test_intangible_entities_are_ignored() {
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 10.0).with_checks_collisions(true));
        let ghost = r.add(square(2.0, 0.0, 10.0).with_tangible(false));
        assert!(!r.grid().contains(ghost));
        assert_eq!(r.resolve_collisions(Filter::Any), 0);
        r.modify(ghost, |e| e.tangible = true);
        assert_eq!(r.collision(a, Filter::Any, None), vec![ghost]);
        r.remove(ghost);
        assert!(r.collision(a, Filter::Any, None).is_empty());
        assert!(!r.grid().contains(ghost));
    }

    #[test]
    fn test_intangible_entity_detects_nothing() {
        let mut r = room();
        let ghost = r.add(square(0.0, 0.0, 10.0).with_tangible(false));
        let wall = r.add(square(5.0, 0.0, 10.0));
        assert!(r.collision(ghost, Filter::Any, None).is_empty());
        assert!(r.collision(ghost, Filter::Any, Some(Vec2::new(6.0, 0.0))).is_empty());
        assert!(r.collision(wall, Filter::Any, None).is_empty());
        r.modify(ghost, |e| e.tangible = true);
        assert_eq!(r.collision(ghost, Filter::Any, None), vec![wall]);
        assert_eq!(r.collision(wall, Filter::Any, None), vec![ghost]);
    }

    #[test]
    fn test_rounded_masks_reach_neighbouring_cells() {
        let mut provider = SpriteMasks::new();
        provider.insert(SpriteKey(3), 0, Mask::filled(5, 10));
        let cfg = RoomConfig::new(100.0, 100.0).with_cell_size(10.0, 10.0);
        let mut r = Room::new(cfg, provider).unwrap();

        // The ellipse mask lands at x = round(0.5) = 1 and spans 10 pixels,
        // so its right column sits in the second cell
        let round = r.add(
            Entity::new(Vec2::ZERO, Rect::new(0.5, 0.0, 9.5, 10.0))
                .with_mode(CollisionMode::Ellipse)
                .with_checks_collisions(true),
        );
        let sprite = r.add(
            Entity::new(Vec2::new(10.0, 0.0), Rect::new(0.0, 0.0, 5.0, 10.0))
                .with_mode(CollisionMode::Precise)
                .with_visual(VisualFrame {
                    sprite: SpriteKey(3),
                    frame: 0,
                    width: 5,
                    height: 10,
                    origin: Vec2::ZERO,
                    transform: Transform::default(),
                }),
        );
        assert!(r.overlaps(round, sprite, None));
        assert_eq!(r.collision(round, Filter::Any, None), vec![sprite]);
        assert_eq!(r.collision(sprite, Filter::Any, None), vec![round]);
        assert_eq!(r.resolve_collisions(Filter::Any), 2);

        // Same for query shapes
        let boxed = r.add(Entity::new(Vec2::new(10.0, 20.0), Rect::new(0.0, 0.0, 5.0, 5.0)));
        assert_eq!(r.collide_ellipse(Rect::new(0.5, 20.0, 9.5, 5.0), Filter::Entity(boxed)), vec![boxed]);
    }

    #[test]
    fn test_degraded_footprint_skips_entity() {
        let mut r = room();
        let bad = r.add(
            Entity::new(Vec2::new(f32::NAN, 0.0), Rect::new(0.0, 0.0, 10.0, 10.0)).with_checks_collisions(true),
        );
        r.add(square(0.0, 0.0, 10.0));
        assert!(!r.grid().contains(bad));
        assert_eq!(r.resolve_collisions(Filter::Any), 0);
        r.set_position(bad, Vec2::new(1.0, 1.0));
        assert_eq!(r.resolve_collisions(Filter::Any), 2);
    }

    #[test]
    fn test_hypothetical_position_does_not_move() {
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 10.0));
        let b = r.add(square(50.0, 0.0, 10.0));
        assert!(r.collision(a, Filter::Any, None).is_empty());
        assert_eq!(r.collision(a, Filter::Any, Some(Vec2::new(45.0, 0.0))), vec![b]);
        assert!(r.overlaps(a, b, Some(Vec2::new(45.0, 0.0))));
        assert_eq!(r.get(a).unwrap().position, Vec2::ZERO);
        assert_eq!(r.grid().footprint_of(a), Some(Rect::new(0.0, 0.0, 11.0, 11.0)));
    }

    #[test]
    fn test_ellipse_corners_do_not_touch() {
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 10.0).with_mode(CollisionMode::Ellipse));
        let b = r.add(square(8.0, 8.0, 10.0).with_mode(CollisionMode::Ellipse));
        assert!(!r.overlaps(a, b, None));
        // The box covers the one solid corner pixel of a's ellipse
        r.modify(b, |e| e.mode = CollisionMode::Rectangle);
        assert!(r.overlaps(a, b, None));
        r.set_position(b, Vec2::new(9.0, 9.0));
        assert!(!r.overlaps(a, b, None));
        r.modify(a, |e| e.mode = CollisionMode::Rectangle);
        assert!(r.overlaps(a, b, None));
        r.set_position(b, Vec2::new(4.0, 4.0));
        r.modify(a, |e| e.mode = CollisionMode::Ellipse);
        assert!(r.overlaps(a, b, None) && r.overlaps(b, a, None));
    }

    fn corner_sprite() -> (SpriteMasks, VisualFrame) {
        let mut provider = SpriteMasks::new();
        provider.insert(SpriteKey(1), 0, Mask::from_rows(&["#...", "....", "....", "...."]));
        let visual = VisualFrame {
            sprite: SpriteKey(1),
            frame: 0,
            width: 4,
            height: 4,
            origin: Vec2::ZERO,
            transform: Transform::default(),
        };
        (provider, visual)
    }

    #[test]
    fn test_precise_uses_pixels() {
        let (provider, visual) = corner_sprite();
        let mut r = Room::new(RoomConfig::new(100.0, 100.0), provider).unwrap();
        let a = r.add(
            square(0.0, 0.0, 4.0)
                .with_mode(CollisionMode::Precise)
                .with_visual(visual),
        );
        let b = r.add(square(2.0, 2.0, 4.0));
        assert!(!r.overlaps(a, b, None));
        assert!(!r.overlaps(b, a, None));
        r.set_position(b, Vec2::new(-1.0, -1.0));
        r.modify(b, |e| e.bbox = Rect::new(0.0, 0.0, 2.0, 2.0));
        assert!(r.overlaps(a, b, None));
        assert_eq!(r.collide_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Filter::Entity(a)), vec![a]);
        assert!(r.collide_rectangle(Rect::new(2.0, 2.0, 2.0, 2.0), Filter::Any).is_empty());

        // Flipped horizontally the solid pixel moves to the top-right
        r.modify(a, |e| {
            if let Some(v) = e.visual.as_mut() {
                v.transform.xscale = -1.0;
            }
        });
        assert_eq!(r.collide_rectangle(Rect::new(-1.0, 0.0, 1.0, 1.0), Filter::Entity(a)), vec![a]);
        assert!(r.collide_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Filter::Entity(a)).is_empty());
    }

    #[test]
    fn test_precise_falls_back_to_box() {
        let (_, visual) = corner_sprite();
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 4.0).with_mode(CollisionMode::Precise));
        let b = r.add(square(2.0, 2.0, 4.0));
        // No visual frame
        assert!(r.overlaps(a, b, None));
        // Frame the provider cannot supply
        r.modify(a, |e| e.visual = Some(visual));
        assert!(r.overlaps(a, b, None));

        let (provider, _) = corner_sprite();
        r.set_mask_provider(provider);
        assert!(!r.overlaps(a, b, None));
    }

    #[test]
    fn test_invalidate_sprite_regenerates() {
        let (provider, visual) = corner_sprite();
        let mut r = Room::new(RoomConfig::new(100.0, 100.0), provider).unwrap();
        let a = r.add(square(0.0, 0.0, 4.0).with_mode(CollisionMode::Precise).with_visual(visual));
        assert_eq!(r.collide_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Filter::Any), vec![a]);
        let cached = r.masks().len();
        r.invalidate_sprite(SpriteKey(1));
        assert!(r.masks().len() < cached);
        assert_eq!(r.collide_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Filter::Any), vec![a]);
    }

    #[test]
    fn test_shape_queries() {
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 10.0));
        let round = r.add(square(100.0, 100.0, 20.0).with_mode(CollisionMode::Ellipse));

        assert_eq!(r.collide_rectangle(Rect::new(5.0, 5.0, 1.0, 1.0), Filter::Any), vec![a]);
        assert!(r.collide_rectangle(Rect::new(5.0, 5.0, 0.0, 1.0), Filter::Any).is_empty());
        assert!(r.collide_circle(Vec2::new(30.0, 5.0), 3.0, Filter::Any).is_empty());
        assert_eq!(r.collide_circle(Vec2::new(110.0, 110.0), 3.0, Filter::Any), vec![round]);

        // Circle and square around the ellipse's corner
        assert!(r.collide_circle(Vec2::new(100.0, 100.0), 3.0, Filter::Any).is_empty());
        assert_eq!(r.collide_rectangle(Rect::new(95.0, 95.0, 10.0, 10.0), Filter::Any), vec![round]);
        assert_eq!(r.collide_ellipse(Rect::new(-5.0, -5.0, 20.0, 20.0), Filter::Any), vec![a]);

        assert_eq!(r.collide_line(Vec2::new(-5.0, -5.0), Vec2::new(20.0, 20.0), Filter::Any), vec![a]);
        assert_eq!(r.collide_line(Vec2::new(100.0, 120.0), Vec2::new(120.0, 100.0), Filter::Any), vec![round]);
        assert!(r.collide_line(Vec2::new(98.0, 103.0), Vec2::new(103.0, 98.0), Filter::Any).is_empty());
        // Horizontal line degrades to a one-pixel box
        assert_eq!(r.collide_line(Vec2::new(-10.0, 5.0), Vec2::new(3.0, 5.0), Filter::Any), vec![a]);
        assert!(r.collide_line(Vec2::new(95.0, 95.0), Vec2::new(101.0, 95.0), Filter::Any).is_empty());

        assert!(r.collide_rectangle(Rect::new(5.0, 5.0, 1.0, 1.0), Filter::Entity(round)).is_empty());
    }

    #[test]
    fn test_cell_size_change_keeps_results() {
        let mut r = room();
        let a = r.add(square(30.0, 30.0, 10.0).with_checks_collisions(true));
        let b = r.add(square(35.0, 35.0, 10.0));
        let far = r.add(square(300.0, 10.0, 10.0));
        assert!(r.grid().void().contains(&far));

        r.set_cell_size(7.0, 13.0).unwrap();
        assert_eq!(r.collision(a, Filter::Any, None), vec![b]);
        r.set_room_size(400.0, 200.0).unwrap();
        assert!(!r.grid().void().contains(&far));
        assert_eq!(r.config().cell_size(), (7.0, 13.0));
        assert!(r.set_cell_size(0.0, 1.0).is_err());
        assert_eq!(r.config().cell_size(), (7.0, 13.0));
        assert_eq!(r.resolve_collisions(Filter::Any), 2);
    }

    #[test]
    fn test_finish_frame_copies_positions() {
        let mut r = room();
        let a = r.add(square(0.0, 0.0, 10.0));
        r.set_position(a, Vec2::new(3.0, 4.0));
        assert_eq!(r.get(a).unwrap().previous, Vec2::ZERO);
        r.finish_frame();
        assert_eq!(r.get(a).unwrap().previous, Vec2::new(3.0, 4.0));
    }

    /// Quarter-pixel steps in `[lo, lo + steps / 4)`.
    fn quarters(seed: &mut u32, lo: f32, steps: u32) -> f32 {
        lo + (lcg(seed) % steps) as f32 * 0.25
    }

    /// Random room with every collision mode and fractional geometry.
    fn random_room(seed: &mut u32, n: usize) -> (Room, Vec<EntityId>) {
        let mut provider = SpriteMasks::new();
        provider.insert(SpriteKey(1), 0, Mask::ellipse(9, 5));
        provider.insert(SpriteKey(2), 0, Mask::from_fn(6, 6, |x, y| (x + y) % 3 == 0));
        let mut r = Room::new(RoomConfig::new(120.0, 120.0).with_cell_size(16.0, 16.0), provider).unwrap();

        let mut ids = Vec::new();
        for _ in 0..n {
            let pos = Vec2::new(quarters(seed, -5.0, 520), quarters(seed, -5.0, 520));
            let offset = Vec2::new(quarters(seed, -1.0, 9), quarters(seed, -1.0, 9));
            let size = Vec2::new(quarters(seed, 0.25, 72), quarters(seed, 0.25, 72));
            let mut e = Entity::new(pos, Rect::new(offset.x, offset.y, size.x, size.y))
                .with_checks_collisions(lcg(seed) % 3 != 0);
            match lcg(seed) % 3 {
                0 => {}
                1 => e.mode = CollisionMode::Ellipse,
                _ => {
                    let sprite = SpriteKey(1 + (lcg(seed) % 2) as u64);
                    let (w, h) = if sprite.0 == 1 { (9, 5) } else { (6, 6) };
                    let scales = [1.0, -1.0, 2.0];
                    e.mode = CollisionMode::Precise;
                    e.visual = Some(VisualFrame {
                        sprite,
                        frame: 0,
                        width: w,
                        height: h,
                        origin: Vec2::new(quarters(seed, 0.0, 12), quarters(seed, 0.0, 12)),
                        transform: Transform {
                            xscale: scales[(lcg(seed) % 3) as usize],
                            yscale: scales[(lcg(seed) % 3) as usize],
                            rotation: [0.0, 30.0, 90.0, 180.0][(lcg(seed) % 4) as usize],
                        },
                    });
                }
            }
            ids.push(r.add(e));
        }
        (r, ids)
    }

    #[test]
    fn test_overlap_is_symmetric_in_every_mode() {
        let mut seed = 99;
        let (r, ids) = random_room(&mut seed, 60);
        for &a in &ids {
            for &b in &ids {
                if a != b {
                    assert_eq!(r.overlaps(a, b, None), r.overlaps(b, a, None), "{a:?} vs {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_collision_matches_brute_force() {
        let mut seed = 31337;
        let (r, ids) = random_room(&mut seed, 60);
        for &a in &ids {
            for at in [None, Some(Vec2::new(quarters(&mut seed, 0.0, 480), quarters(&mut seed, 0.0, 480)))] {
                let mut expected: Vec<EntityId> = ids
                    .iter()
                    .copied()
                    .filter(|&b| b != a && r.overlaps(a, b, at))
                    .collect();
                expected.sort_unstable();
                assert_eq!(r.collision(a, Filter::Any, at), expected, "{a:?} at {at:?}");
            }
        }
    }

    #[test]
    fn test_resolution_matches_brute_force() {
        let mut seed = 4242;
        let (mut r, ids) = random_room(&mut seed, 50);

        for round in 0..4 {
            let mut expected = FxHashSet::default();
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    let checks = r.get(a).unwrap().checks_collisions || r.get(b).unwrap().checks_collisions;
                    if checks && r.overlaps(a, b, None) {
                        expected.insert((a, b));
                        expected.insert((b, a));
                    }
                }
            }

            r.resolve_collisions(Filter::Any);
            let events = r.drain_events();
            let got: FxHashSet<(EntityId, EntityId)> = events.iter().map(|e| (e.entity, e.other)).collect();
            assert_eq!(events.len(), got.len(), "pair dispatched twice in round {round}");
            assert_eq!(got, expected, "round {round}");

            for &id in &ids {
                let step = Vec2::new(quarters(&mut seed, -4.0, 33), quarters(&mut seed, -4.0, 33));
                r.modify(id, |e| e.position += step);
                let e = r.get(id).unwrap();
                assert_eq!(r.grid().footprint_of(id), Some(e.footprint()));
            }
            r.finish_frame();
        }
    }
}
