use serde::{Deserialize, Serialize};

use crate::hit_test::CropHandle;

/// Normalized region kept by an export crop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl CropRect {
    pub const FULL: CropRect = CropRect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };

    /// Build a rectangle clipped to the unit square.  Any non-finite
    /// component gives the full image.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Self::FULL;
        }
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        Self {
            x,
            y,
            width: width.clamp(0.0, 1.0 - x),
            height: height.clamp(0.0, 1.0 - y),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// `anchor` shifted by `(dx, dy)`, keeping its size and staying inside the unit square.
    pub fn moved(anchor: &CropRect, dx: f32, dy: f32) -> CropRect {
        CropRect {
            x: (anchor.x + dx).clamp(0.0, (1.0 - anchor.width).max(0.0)),
            y: (anchor.y + dy).clamp(0.0, (1.0 - anchor.height).max(0.0)),
            width: anchor.width,
            height: anchor.height,
        }
    }

    /// `anchor` with the edges grabbed by `handle` shifted by `(dx, dy)`.
    /// Each side keeps at least `min_size`; the opposite edges never move.
    pub fn resized(anchor: &CropRect, handle: CropHandle, dx: f32, dy: f32, min_size: f32) -> CropRect {
        if handle == CropHandle::Center {
            return Self::moved(anchor, dx, dy);
        }
        let (left, top, right, bottom) = handle.edges();
        let min_w = min_size.min(anchor.width);
        let min_h = min_size.min(anchor.height);

        let mut x0 = anchor.x;
        let mut y0 = anchor.y;
        let mut x1 = anchor.right();
        let mut y1 = anchor.bottom();
        if left {
            x0 = (x0 + dx).clamp(0.0, x1 - min_w);
        }
        if right {
            x1 = (x1 + dx).clamp(x0 + min_w, 1.0);
        }
        if top {
            y0 = (y0 + dy).clamp(0.0, y1 - min_h);
        }
        if bottom {
            y1 = (y1 + dy).clamp(y0 + min_h, 1.0);
        }
        CropRect { x: x0, y: y0, width: x1 - x0, height: y1 - y0 }
    }

    /// Pixel rectangle `(x, y, w, h)` on a `width × height` image, at least 1×1.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let px = ((self.x * width as f32).round() as u32).min(width.saturating_sub(1));
        let py = ((self.y * height as f32).round() as u32).min(height.saturating_sub(1));
        let pw = ((self.width * width as f32).round() as u32).clamp(1, width.saturating_sub(px).max(1));
        let ph = ((self.height * height as f32).round() as u32).clamp(1, height.saturating_sub(py).max(1));
        (px, py, pw, ph)
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_keeps_rect_inside_unit_square() {
        let r = CropRect::new(0.2, 0.2, 0.4, 0.4);
        let moved = CropRect::moved(&r, 0.9, -0.9);
        assert!((moved.x - 0.6).abs() < 1e-6);
        assert_eq!(moved.y, 0.0);
        assert_eq!((moved.width, moved.height), (r.width, r.height));
    }

    #[test]
    fn corner_resize_moves_two_edges_only() {
        let r = CropRect::new(0.2, 0.2, 0.4, 0.4);
        let out = CropRect::resized(&r, CropHandle::BottomRight, 0.1, 0.2, 0.05);
        assert!((out.right() - 0.7).abs() < 1e-6);
        assert!((out.bottom() - 0.8).abs() < 1e-6);
        assert_eq!((out.x, out.y), (0.2, 0.2));
    }

    #[test]
    fn resize_never_collapses_below_minimum() {
        let r = CropRect::new(0.2, 0.2, 0.4, 0.4);
        let out = CropRect::resized(&r, CropHandle::Left, 5.0, 0.0, 0.05);
        assert!((out.width - 0.05).abs() < 1e-6);
        assert!((out.right() - 0.6).abs() < 1e-6);
        let out = CropRect::resized(&r, CropHandle::Top, 0.0, -5.0, 0.05);
        assert_eq!(out.y, 0.0);
    }

    #[test]
    fn pixel_rect_is_clamped_to_image() {
        assert_eq!(CropRect::FULL.to_pixels(100, 50), (0, 0, 100, 50));
        assert_eq!(CropRect::new(0.5, 0.5, 0.5, 0.5).to_pixels(10, 10), (5, 5, 5, 5));
        assert_eq!(CropRect::new(1.0, 1.0, 0.0, 0.0).to_pixels(10, 10), (9, 9, 1, 1));
    }

    #[test]
    fn non_finite_input_falls_back_to_full() {
        assert_eq!(CropRect::new(f32::NAN, 0.0, 0.5, 0.5), CropRect::FULL);
        assert_eq!(CropRect::new(0.1, 0.1, f32::INFINITY, 0.5), CropRect::FULL);
        assert_eq!(CropRect::new(0.1, 0.1, 0.5, f32::NEG_INFINITY), CropRect::FULL);
    }
}
