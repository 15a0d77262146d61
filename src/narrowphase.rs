use glam::Vec2;

use crate::api::NarrowphaseApi;
use crate::mask::Mask;
use crate::types::*;

/// Narrowphase primitive tests.
pub struct Narrowphase;

impl NarrowphaseApi for Narrowphase {
    fn rectangles_collide(a: Rect, b: Rect) -> bool {
        if a.is_degenerate() || b.is_degenerate() {
            return false;
        }
        a.left() < b.right() && a.right() > b.left() && a.top() < b.bottom() && a.bottom() > b.top()
    }

    fn overlap_rect(a: Rect, b: Rect) -> Option<Rect> {
        if !Self::rectangles_collide(a, b) {
            return None;
        }
        let min = a.min().max(b.min());
        let max = a.max().min(b.max());
        Some(Rect::from_min_max(min, max))
    }

    fn masks_collide(pos_a: Vec2, a: &Mask, pos_b: Vec2, b: &Mask) -> bool {
        if a.is_empty() || b.is_empty() {
            return false;
        }
        // Masks live on the pixel grid
        let (ax, ay) = (pos_a.x.round() as i64, pos_a.y.round() as i64);
        let (bx, by) = (pos_b.x.round() as i64, pos_b.y.round() as i64);

        let x0 = ax.max(bx);
        let x1 = (ax + a.width() as i64).min(bx + b.width() as i64);
        let y0 = ay.max(by);
        let y1 = (ay + a.height() as i64).min(by + b.height() as i64);
        if x0 >= x1 || y0 >= y1 {
            return false;
        }

        for y in y0..y1 {
            for x in x0..x1 {
                if a.get((x - ax) as u32, (y - ay) as u32) && b.get((x - bx) as u32, (y - by) as u32)
                {
                    return true;
                }
            }
        }
        false
    }
}
