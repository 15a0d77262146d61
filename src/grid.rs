use rustc_hash::FxHashSet;
use slotmap::SecondaryMap;

use crate::api::SpatialIndexApi;
use crate::error::{ConfigError, validate_sizes};
use crate::types::*;

/// One bucket of the object area grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Area {
    Cell { column: u32, row: u32 },
    /// Everything outside the grid's coordinate range.
    Void,
}

/// Uniform grid over a room: `columns x rows` cells of `cell_width x
/// cell_height`, plus a void bucket for anything reaching outside
/// `[0, columns * cell_width) x [0, rows * cell_height)`.
///
/// Every indexed entity is referenced by exactly the areas of its latest
/// footprint.
pub struct ObjectAreaGrid {
    room_width: f32,
    room_height: f32,
    cell_width: f32,
    cell_height: f32,
    columns: u32,
    rows: u32,

    // Row-major: index = row * columns + column
    cells: Vec<FxHashSet<EntityId>>,
    void: FxHashSet<EntityId>,

    // Per-entity bookkeeping
    areas: SecondaryMap<EntityId, FxHashSet<Area>>,
    footprints: SecondaryMap<EntityId, Rect>,
}

impl ObjectAreaGrid {
    pub fn new(
        room_width: f32,
        room_height: f32,
        cell_width: f32,
        cell_height: f32,
    ) -> Result<Self, ConfigError> {
        validate_sizes(room_width, room_height, cell_width, cell_height)?;
        let mut grid = Self {
            room_width,
            room_height,
            cell_width,
            cell_height,
            columns: 0,
            rows: 0,
            cells: Vec::new(),
            void: FxHashSet::default(),
            areas: SecondaryMap::new(),
            footprints: SecondaryMap::new(),
        };
        grid.build_cells();
        Ok(grid)
    }

    pub fn from_config(cfg: &RoomConfig) -> Result<Self, ConfigError> {
        let (cw, ch) = cfg.cell_size();
        Self::new(cfg.width, cfg.height, cw, ch)
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_size(&self) -> (f32, f32) {
        (self.cell_width, self.cell_height)
    }

    pub fn room_size(&self) -> (f32, f32) {
        (self.room_width, self.room_height)
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.areas.contains_key(id)
    }

    /// Areas currently referencing `id`.
    pub fn areas_of(&self, id: EntityId) -> Option<&FxHashSet<Area>> {
        self.areas.get(id)
    }

    /// Footprint `id` was last indexed with.
    pub fn footprint_of(&self, id: EntityId) -> Option<Rect> {
        self.footprints.get(id).copied()
    }

    pub fn cell(&self, column: u32, row: u32) -> Option<&FxHashSet<EntityId>> {
        if column < self.columns && row < self.rows {
            Some(&self.cells[self.cell_index(column, row)])
        } else {
            None
        }
    }

    pub fn void(&self) -> &FxHashSet<EntityId> {
        &self.void
    }

    /// Areas a rectangle covers. Invalid rectangles cover nothing.
    pub fn areas_for_rect(&self, rect: Rect) -> FxHashSet<Area> {
        let mut areas = FxHashSet::default();
        if !rect.is_valid() {
            return areas;
        }

        let xs = (rect.left() / self.cell_width).floor();
        let ys = (rect.top() / self.cell_height).floor();
        // Exclusive ends; a zero-size rect still lands in the cell holding it
        let xe = (rect.right() / self.cell_width).ceil().max(xs + 1.0);
        let ye = (rect.bottom() / self.cell_height).ceil().max(ys + 1.0);
        let cols = self.columns as f32;
        let rows = self.rows as f32;

        if xs >= cols || ys >= rows || xe <= 0.0 || ye <= 0.0 {
            areas.insert(Area::Void);
            return areas;
        }
        if xs < 0.0 || ys < 0.0 || xe > cols || ye > rows {
            areas.insert(Area::Void);
        }

        let (c0, c1) = (xs.max(0.0) as u32, xe.min(cols) as u32);
        let (r0, r1) = (ys.max(0.0) as u32, ye.min(rows) as u32);
        for column in c0..c1 {
            for row in r0..r1 {
                areas.insert(Area::Cell { column, row });
            }
        }
        areas
    }

    /// Other entities sharing at least one area with `id`, sorted.
    /// `None` if `id` was never indexed.
    pub fn candidates_of(&self, id: EntityId) -> Option<Vec<EntityId>> {
        let Some(areas) = self.areas.get(id) else {
            log::warn!("collision candidates requested for unindexed entity {id:?}");
            return None;
        };
        let mut seen = FxHashSet::default();
        for &area in areas {
            seen.extend(self.bucket(area).iter().copied());
        }
        seen.remove(&id);
        let mut out: Vec<EntityId> = seen.into_iter().collect();
        out.sort_unstable();
        Some(out)
    }

    /// Debug statistics for the current memberships.
    pub fn stats(&self) -> GridStats {
        let occupied_cells = self.cells.iter().filter(|c| !c.is_empty()).count();
        let memberships = self.cells.iter().map(|c| c.len()).sum::<usize>() + self.void.len();
        GridStats {
            entities: self.areas.len(),
            columns: self.columns,
            rows: self.rows,
            occupied_cells,
            void_entities: self.void.len(),
            memberships,
        }
    }

    fn build_cells(&mut self) {
        self.columns = (self.room_width / self.cell_width).ceil().max(1.0) as u32;
        self.rows = (self.room_height / self.cell_height).ceil().max(1.0) as u32;
        self.cells = vec![FxHashSet::default(); self.columns as usize * self.rows as usize];
        self.void.clear();
        self.areas.clear();
    }

    #[inline]
    fn cell_index(&self, column: u32, row: u32) -> usize {
        row as usize * self.columns as usize + column as usize
    }

    fn bucket(&self, area: Area) -> &FxHashSet<EntityId> {
        match area {
            Area::Cell { column, row } => &self.cells[self.cell_index(column, row)],
            Area::Void => &self.void,
        }
    }

    fn bucket_mut(&mut self, area: Area) -> &mut FxHashSet<EntityId> {
        match area {
            Area::Cell { column, row } => {
                let idx = self.cell_index(column, row);
                &mut self.cells[idx]
            }
            Area::Void => &mut self.void,
        }
    }
}

impl SpatialIndexApi for ObjectAreaGrid {
    fn insert_or_update(&mut self, id: EntityId, footprint: Rect) {
        if !footprint.is_valid() {
            log::warn!(
                "entity {id:?} has an invalid footprint {footprint:?}; it participates in no collisions"
            );
            self.remove(id);
            return;
        }

        let new_areas = self.areas_for_rect(footprint);
        let old_areas = self.areas.remove(id).unwrap_or_default();
        for &area in old_areas.difference(&new_areas) {
            self.bucket_mut(area).remove(&id);
        }
        for &area in new_areas.difference(&old_areas) {
            self.bucket_mut(area).insert(id);
        }
        self.areas.insert(id, new_areas);
        self.footprints.insert(id, footprint);
    }

    fn remove(&mut self, id: EntityId) {
        self.footprints.remove(id);
        if let Some(areas) = self.areas.remove(id) {
            for area in areas {
                self.bucket_mut(area).remove(&id);
            }
        }
    }

    fn query_rect(&self, rect: Rect) -> FxHashSet<EntityId> {
        let mut out = FxHashSet::default();
        for area in self.areas_for_rect(rect) {
            out.extend(self.bucket(area).iter().copied());
        }
        out
    }

    fn resize(
        &mut self,
        room_width: f32,
        room_height: f32,
        cell_width: f32,
        cell_height: f32,
    ) -> Result<(), ConfigError> {
        validate_sizes(room_width, room_height, cell_width, cell_height)?;
        self.room_width = room_width;
        self.room_height = room_height;
        self.cell_width = cell_width;
        self.cell_height = cell_height;

        let footprints: Vec<(EntityId, Rect)> = self.footprints.iter().map(|(id, r)| (id, *r)).collect();
        self.build_cells();
        for (id, footprint) in footprints {
            self.insert_or_update(id, footprint);
        }
        log::debug!(
            "object areas rebuilt: {}x{} cells of {}x{}, {} entities",
            self.columns,
            self.rows,
            cell_width,
            cell_height,
            self.areas.len()
        );
        Ok(())
    }
}
