use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use rustc_hash::FxHashMap;

use crate::api::MaskProvider;
use crate::error::MaskError;
use crate::types::*;

/// Per-pixel occupancy grid, row-major.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// Empty (all clear) mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Fully solid mask; the mask of a plain bounding box.
    pub fn filled(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![true; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut solid: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(solid(x, y));
            }
        }
        Self { width, height, bits }
    }

    /// Build from text rows, `#` or `X` marking solid pixels. Short rows are
    /// padded with clear pixels.
    pub fn from_rows(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        Self::from_fn(width, rows.len() as u32, |x, y| {
            matches!(rows[y as usize].chars().nth(x as usize), Some('#' | 'X'))
        })
    }

    /// Ellipse inscribed in a `width x height` box, sampled at pixel centers.
    pub fn ellipse(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::new(width, height);
        }
        let a = width as f32 / 2.0;
        let b = height as f32 / 2.0;
        Self::from_fn(width, height, |x, y| {
            let dx = (x as f32 + 0.5 - a) / a;
            let dy = (y as f32 + 0.5 - b) / b;
            dx * dx + dy * dy <= 1.0
        })
    }

    /// One-pixel line between two points (Bresenham), clipped to the mask.
    pub fn line(width: u32, height: u32, from: (i32, i32), to: (i32, i32)) -> Self {
        let mut mask = Self::new(width, height);
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            if x >= 0 && y >= 0 {
                mask.set(x as u32, y as u32, true);
            }
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Solid test; out-of-range pixels are clear.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, solid: bool) {
        if x < self.width && y < self.height {
            self.bits[(y * self.width + x) as usize] = solid;
        }
    }

    pub fn count_solid(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Apply flip, scale and rotation. Returns the new mask and `origin`
    /// carried through the same transform.
    pub fn transformed(&self, origin: Vec2, transform: Transform) -> (Mask, Vec2) {
        let plan = TransformPlan::new(self.width, self.height, origin, transform);
        (plan.apply(self), plan.origin)
    }
}

impl VisualFrame {
    /// Size of the frame as drawn (after scale and rotation).
    pub fn drawn_size(&self) -> (u32, u32) {
        self.plan().size
    }

    /// Origin of the drawn frame, relative to its top-left corner.
    pub fn drawn_origin(&self) -> Vec2 {
        self.plan().origin
    }

    /// Area covered by the drawn frame when its owner is at `position`.
    pub fn placement(&self, position: Vec2) -> Rect {
        let plan = self.plan();
        let min = position - plan.origin;
        Rect::new(min.x, min.y, plan.size.0 as f32, plan.size.1 as f32)
    }

    fn plan(&self) -> TransformPlan {
        TransformPlan::new(self.width, self.height, self.origin, self.transform)
    }
}

/// Geometry of a flip/scale/rotate applied to a `src`-sized image.
struct TransformPlan {
    src: (u32, u32),
    scaled: (u32, u32),
    flip_x: bool,
    flip_y: bool,
    /// (sin, cos) of the clockwise rotation, if any.
    rotation: Option<(f32, f32)>,
    size: (u32, u32),
    origin: Vec2,
}

impl TransformPlan {
    fn new(width: u32, height: u32, origin: Vec2, t: Transform) -> Self {
        let scaled = (scaled_len(width, t.xscale), scaled_len(height, t.yscale));
        let flip_x = t.xscale < 0.0;
        let flip_y = t.yscale < 0.0;

        let mut o = origin;
        if flip_x {
            o.x = width as f32 - o.x;
        }
        if flip_y {
            o.y = height as f32 - o.y;
        }
        o *= Vec2::new(t.xscale.abs(), t.yscale.abs());

        let degrees = t.rotation.rem_euclid(360.0);
        if !degrees.is_finite() || degrees == 0.0 || scaled.0 == 0 || scaled.1 == 0 {
            return Self {
                src: (width, height),
                scaled,
                flip_x,
                flip_y,
                rotation: None,
                size: scaled,
                origin: o,
            };
        }

        let (sin, cos) = degrees.to_radians().sin_cos();
        let (fw, fh) = (scaled.0 as f32, scaled.1 as f32);
        let size = (
            snap_ceil(fw * cos.abs() + fh * sin.abs()),
            snap_ceil(fw * sin.abs() + fh * cos.abs()),
        );
        // Rotate the origin about the image center, then recenter on the
        // expanded extent.
        let rel = o - Vec2::new(fw, fh) / 2.0;
        let rotated = Vec2::new(rel.x * cos - rel.y * sin, rel.x * sin + rel.y * cos);
        Self {
            src: (width, height),
            scaled,
            flip_x,
            flip_y,
            rotation: Some((sin, cos)),
            size,
            origin: rotated + Vec2::new(size.0 as f32, size.1 as f32) / 2.0,
        }
    }

    fn apply(&self, src: &Mask) -> Mask {
        let (sw, sh) = self.scaled;
        if src.is_empty() || sw == 0 || sh == 0 {
            return Mask::new(self.size.0, self.size.1);
        }

        // Nearest-neighbour lookup into the flipped, scaled image.
        let scaled_at = |x: u32, y: u32| -> bool {
            let mut u = ((2 * x as u64 + 1) * self.src.0 as u64 / (2 * sw as u64)) as u32;
            let mut v = ((2 * y as u64 + 1) * self.src.1 as u64 / (2 * sh as u64)) as u32;
            u = u.min(self.src.0 - 1);
            v = v.min(self.src.1 - 1);
            if self.flip_x {
                u = self.src.0 - 1 - u;
            }
            if self.flip_y {
                v = self.src.1 - 1 - v;
            }
            src.get(u, v)
        };

        let Some((sin, cos)) = self.rotation else {
            return Mask::from_fn(sw, sh, scaled_at);
        };

        let (fw, fh) = (sw as f32, sh as f32);
        let half_dst = Vec2::new(self.size.0 as f32, self.size.1 as f32) / 2.0;
        let half_src = Vec2::new(fw, fh) / 2.0;
        Mask::from_fn(self.size.0, self.size.1, |x, y| {
            // Inverse rotation of the destination pixel center.
            let q = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - half_dst;
            let p = Vec2::new(q.x * cos + q.y * sin, -q.x * sin + q.y * cos) + half_src;
            p.x >= 0.0 && p.y >= 0.0 && p.x < fw && p.y < fh && scaled_at(p.x as u32, p.y as u32)
        })
    }
}

fn scaled_len(len: u32, scale: f32) -> u32 {
    let v = (len as f32 * scale.abs()).round();
    if v.is_finite() && v > 0.0 { v as u32 } else { 0 }
}

fn snap_ceil(v: f32) -> u32 {
    (v - 1e-3).ceil().max(0.0) as u32
}

/// Whole-pixel size of a box extent, as used for bounding-box masks.
pub(crate) fn pixels(v: f32) -> u32 {
    let v = v.round();
    if v.is_finite() && v > 0.0 { v as u32 } else { 0 }
}

// --- Cache ------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum MaskKey {
    Rectangle { w: u32, h: u32 },
    Ellipse { w: u32, h: u32 },
    Line { w: u32, h: u32, from: (i32, i32), to: (i32, i32) },
    Precise {
        sprite: SpriteKey,
        frame: u32,
        origin: (u32, u32),
        xscale: u32,
        yscale: u32,
        rotation: u32,
    },
}

/// Value-keyed cache of derived masks.
///
/// Lookups take `&self`; stored masks are immutable and shared, so one
/// cache serves every query of a frame. Shape masks never go stale; precise
/// masks are dropped with [`MaskCache::invalidate_sprite`] when a sprite's
/// pixels change.
#[derive(Default)]
pub struct MaskCache {
    entries: RefCell<FxHashMap<MaskKey, (Rc<Mask>, Vec2)>>,
}

impl MaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rectangle(&self, width: u32, height: u32) -> Rc<Mask> {
        let key = MaskKey::Rectangle { w: width, h: height };
        self.shape(key, || Mask::filled(width, height))
    }

    pub fn ellipse(&self, width: u32, height: u32) -> Rc<Mask> {
        let key = MaskKey::Ellipse { w: width, h: height };
        self.shape(key, || Mask::ellipse(width, height))
    }

    pub fn line(&self, width: u32, height: u32, from: (i32, i32), to: (i32, i32)) -> Rc<Mask> {
        let key = MaskKey::Line { w: width, h: height, from, to };
        self.shape(key, || Mask::line(width, height, from, to))
    }

    /// Transformed opacity mask of `frame` and its drawn origin.
    pub fn precise(
        &self,
        frame: &VisualFrame,
        provider: &dyn MaskProvider,
    ) -> Result<(Rc<Mask>, Vec2), MaskError> {
        let t = frame.transform;
        let key = MaskKey::Precise {
            sprite: frame.sprite,
            frame: frame.frame,
            origin: (frame.origin.x.to_bits(), frame.origin.y.to_bits()),
            xscale: t.xscale.to_bits(),
            yscale: t.yscale.to_bits(),
            rotation: t.rotation.rem_euclid(360.0).to_bits(),
        };
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }

        let base = provider
            .opacity_mask(frame.sprite, frame.frame)
            .ok_or(MaskError::FrameUnavailable {
                sprite: frame.sprite,
                frame: frame.frame,
            })?;
        if base.size() != (frame.width, frame.height) {
            return Err(MaskError::SizeMismatch {
                sprite: frame.sprite,
                frame: frame.frame,
                got: base.size(),
                expected: (frame.width, frame.height),
            });
        }
        let (mask, origin) = base.transformed(frame.origin, t);
        Ok((self.store(key, mask, origin), origin))
    }

    /// Forget every precise mask derived from `sprite`.
    pub fn invalidate_sprite(&mut self, sprite: SpriteKey) {
        self.entries
            .get_mut()
            .retain(|k, _| !matches!(k, MaskKey::Precise { sprite: s, .. } if *s == sprite));
    }

    pub fn clear(&mut self) {
        self.entries.get_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self, key: MaskKey, build: impl FnOnce() -> Mask) -> Rc<Mask> {
        match self.lookup(&key) {
            Some((mask, _)) => mask,
            None => self.store(key, build(), Vec2::ZERO),
        }
    }

    fn lookup(&self, key: &MaskKey) -> Option<(Rc<Mask>, Vec2)> {
        self.entries
            .borrow()
            .get(key)
            .map(|(mask, origin)| (Rc::clone(mask), *origin))
    }

    fn store(&self, key: MaskKey, mask: Mask, origin: Vec2) -> Rc<Mask> {
        let mask = Rc::new(mask);
        self.entries.borrow_mut().insert(key, (Rc::clone(&mask), origin));
        mask
    }
}

// --- Providers --------------------------------------------------------------

/// Provider for rooms without precise collision: every lookup fails, so
/// precise entities fall back to their bounding boxes.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoMasks;

impl MaskProvider for NoMasks {
    fn opacity_mask(&self, _sprite: SpriteKey, _frame: u32) -> Option<Mask> {
        None
    }
}

/// In-memory table of frame masks.
#[derive(Clone, Debug, Default)]
pub struct SpriteMasks {
    frames: FxHashMap<(SpriteKey, u32), Mask>,
}

impl SpriteMasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sprite: SpriteKey, frame: u32, mask: Mask) -> Option<Mask> {
        self.frames.insert((sprite, frame), mask)
    }

    pub fn remove(&mut self, sprite: SpriteKey, frame: u32) -> Option<Mask> {
        self.frames.remove(&(sprite, frame))
    }
}

impl MaskProvider for SpriteMasks {
    fn opacity_mask(&self, sprite: SpriteKey, frame: u32) -> Option<Mask> {
        self.frames.get(&(sprite, frame)).cloned()
    }
}
