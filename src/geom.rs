//! Axis-aligned rectangles for bounds, hotspots and draw regions

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Half-open containment: the left/top edges are inside, right/bottom are not
    pub fn contains(&self, pt: Vec2) -> bool {
        pt.x >= self.x && pt.x < self.right() && pt.y >= self.y && pt.y < self.bottom()
    }

    /// Strict overlap on both axes; rectangles that only touch do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.right() > other.x
            && self.x < other.right()
            && self.bottom() > other.y
            && self.y < other.bottom()
    }

    /// Grow symmetrically so each side is at least `min` long
    pub fn padded_to(&self, min: f32) -> Rect {
        let mut out = *self;
        if out.width < min {
            out.x -= (min - out.width) / 2.0;
            out.width = min;
        }
        if out.height < min {
            out.y -= (min - out.height) / 2.0;
            out.height = min;
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_contains_is_half_open() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Vec2::new(0.0, 0.0)));
        assert!(r.contains(Vec2::new(9.9, 9.9)));
        assert!(!r.contains(Vec2::new(10.0, 5.0)));
    }

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9.0, 9.0, 5.0, 5.0)));
    }

    #[test]
    fn test_padded_to_keeps_center() {
        let r = Rect::new(10.0, 10.0, 4.0, 20.0).padded_to(10.0);
        assert_eq!(r, Rect::new(7.0, 10.0, 10.0, 20.0));
    }

    proptest! {
        #[test]
        fn prop_intersects_is_symmetric(
            ax in -100.0f32..100.0, ay in -100.0f32..100.0, aw in 0.0f32..50.0, ah in 0.0f32..50.0,
            bx in -100.0f32..100.0, by in -100.0f32..100.0, bw in 0.0f32..50.0, bh in 0.0f32..50.0,
        ) {
            let a = Rect::new(ax, ay, aw, ah);
            let b = Rect::new(bx, by, bw, bh);
            prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        }

        #[test]
        fn prop_padding_never_shrinks(w in 0.0f32..100.0, h in 0.0f32..100.0, min in 0.0f32..100.0) {
            let r = Rect::new(0.0, 0.0, w, h).padded_to(min);
            prop_assert!(r.width >= w && r.width >= min);
            prop_assert!(r.height >= h && r.height >= min);
        }
    }
}
