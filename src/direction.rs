use std::ops::Neg;

use crate::types::Rect;

/// Side a collision came from, each axis in `{-1, 0, 1}`.
///
/// `x = 1` means the entity approached from the left (it was left of the
/// other one last frame), `x = -1` from the right; `y` likewise with
/// `1` = from above. `(0, 0)` marks a continuous collision: the two boxes
/// already overlapped in the previous frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Direction {
    pub x: i8,
    pub y: i8,
}

impl Direction {
    pub const CONTINUOUS: Direction = Direction { x: 0, y: 0 };

    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    pub fn is_continuous(self) -> bool {
        self == Self::CONTINUOUS
    }
}

impl Neg for Direction {
    type Output = Direction;

    fn neg(self) -> Direction {
        Direction::new(-self.x, -self.y)
    }
}

/// Classify a collision from `a`'s perspective using previous-frame boxes.
/// `b`'s perspective is the negation.
pub fn classify(a_prev: Rect, b_prev: Rect) -> Direction {
    let x = if a_prev.right() <= b_prev.left() {
        1
    } else if a_prev.left() >= b_prev.right() {
        -1
    } else {
        0
    };
    let y = if a_prev.bottom() <= b_prev.top() {
        1
    } else if a_prev.top() >= b_prev.bottom() {
        -1
    } else {
        0
    };
    Direction::new(x, y)
}
