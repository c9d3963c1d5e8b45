// ============================================================================
// HIT TESTING: which layer, crop handle or caption is under the pointer
// ============================================================================
//
// All positions are normalized image coordinates.  Layer boxes are
// axis-aligned even for rotated layers.
// ============================================================================

use crate::crop::CropRect;
use crate::layers::{Caption, LayerStore};

/// Grab points of the crop rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CropHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    /// Inside the rectangle but away from every handle.
    Center,
}

impl CropHandle {
    /// Whether dragging this handle moves the left / top / right / bottom edge.
    pub fn edges(&self) -> (bool, bool, bool, bool) {
        match self {
            CropHandle::TopLeft => (true, true, false, false),
            CropHandle::Top => (false, true, false, false),
            CropHandle::TopRight => (false, true, true, false),
            CropHandle::Right => (false, false, true, false),
            CropHandle::BottomRight => (false, false, true, true),
            CropHandle::Bottom => (false, false, false, true),
            CropHandle::BottomLeft => (true, false, false, true),
            CropHandle::Left => (true, false, false, false),
            CropHandle::Center => (false, false, false, false),
        }
    }
}

/// Classify a pointer against the crop rectangle.
///
/// Corners are checked before edges because every corner also lies on two
/// edges; the first match wins.
pub fn crop_handle_at(x: f32, y: f32, crop: &CropRect, radius: f32) -> Option<CropHandle> {
    let (cx, cy, cw, ch) = (crop.x, crop.y, crop.width, crop.height);
    let near = |a: f32, b: f32| (a - b).abs() < radius;
    let inside_x = x > cx && x < cx + cw;
    let inside_y = y > cy && y < cy + ch;

    if near(x, cx) && near(y, cy) {
        return Some(CropHandle::TopLeft);
    }
    if near(x, cx + cw) && near(y, cy) {
        return Some(CropHandle::TopRight);
    }
    if near(x, cx) && near(y, cy + ch) {
        return Some(CropHandle::BottomLeft);
    }
    if near(x, cx + cw) && near(y, cy + ch) {
        return Some(CropHandle::BottomRight);
    }

    if near(y, cy) && inside_x {
        return Some(CropHandle::Top);
    }
    if near(y, cy + ch) && inside_x {
        return Some(CropHandle::Bottom);
    }
    if near(x, cx) && inside_y {
        return Some(CropHandle::Left);
    }
    if near(x, cx + cw) && inside_y {
        return Some(CropHandle::Right);
    }

    if inside_x && inside_y {
        return Some(CropHandle::Center);
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitKind {
    Move,
    Resize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerHit {
    pub index: usize,
    pub kind: HitKind,
}

/// Topmost layer under the pointer.
///
/// Layers are walked front to back.  Sizes are normalized against `extent`
/// (the viewport size in pixels).  The selected layer's bottom-right corner
/// within `corner_radius` reports a resize hit before the plain move test.
pub fn layer_at(
    layers: &LayerStore,
    selected: Option<usize>,
    x: f32,
    y: f32,
    extent: (f32, f32),
    corner_radius: f32,
) -> Option<LayerHit> {
    let (ew, eh) = extent;
    if !(ew > 0.0 && eh > 0.0) {
        return None;
    }

    for (index, layer) in layers.iter().enumerate().rev() {
        let (sw, sh) = layer.scaled_size();
        let left = layer.x - sw / 2.0 / ew;
        let right = layer.x + sw / 2.0 / ew;
        let top = layer.y - sh / 2.0 / eh;
        let bottom = layer.y + sh / 2.0 / eh;

        if selected == Some(index)
            && (x - right).abs() < corner_radius
            && (y - bottom).abs() < corner_radius
        {
            return Some(LayerHit { index, kind: HitKind::Resize });
        }

        if x >= left && x <= right && y >= top && y <= bottom {
            return Some(LayerHit { index, kind: HitKind::Move });
        }
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptionSlot {
    Top,
    Bottom,
}

/// Caption whose baseline row is near `y`.  The top caption wins when both
/// thresholds overlap.
pub fn caption_at(y: f32, top: &Caption, bottom: &Caption, viewport_h: f32) -> Option<CaptionSlot> {
    if !(viewport_h > 0.0) {
        return None;
    }
    let threshold = |c: &Caption| (0.6 * c.font_size / viewport_h).max(0.1);
    if (y - top.y).abs() < threshold(top) {
        Some(CaptionSlot::Top)
    } else if (y - bottom.y).abs() < threshold(bottom) {
        Some(CaptionSlot::Bottom)
    } else {
        None
    }
}

/// Pointer cursor to show while hovering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CursorHint {
    #[default]
    Default,
    Move,
    Resize,
}

impl From<Option<LayerHit>> for CursorHint {
    fn from(hit: Option<LayerHit>) -> Self {
        match hit.map(|h| h.kind) {
            Some(HitKind::Move) => CursorHint::Move,
            Some(HitKind::Resize) => CursorHint::Resize,
            None => CursorHint::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Layer;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    fn crop() -> CropRect {
        CropRect::new(0.2, 0.2, 0.4, 0.4)
    }

    #[test]
    fn exact_corner_is_a_corner_not_an_edge() {
        let c = crop();
        assert_eq!(crop_handle_at(0.2, 0.2, &c, 0.05), Some(CropHandle::TopLeft));
        assert_eq!(crop_handle_at(0.6, 0.2, &c, 0.05), Some(CropHandle::TopRight));
        assert_eq!(crop_handle_at(0.2, 0.6, &c, 0.05), Some(CropHandle::BottomLeft));
        assert_eq!(crop_handle_at(0.6, 0.6, &c, 0.05), Some(CropHandle::BottomRight));
    }

    #[test]
    fn edge_midpoints_interior_and_outside() {
        let c = crop();
        assert_eq!(crop_handle_at(0.4, 0.2, &c, 0.05), Some(CropHandle::Top));
        assert_eq!(crop_handle_at(0.4, 0.6, &c, 0.05), Some(CropHandle::Bottom));
        assert_eq!(crop_handle_at(0.2, 0.4, &c, 0.05), Some(CropHandle::Left));
        assert_eq!(crop_handle_at(0.6, 0.4, &c, 0.05), Some(CropHandle::Right));
        assert_eq!(crop_handle_at(0.4, 0.4, &c, 0.05), Some(CropHandle::Center));
        assert_eq!(crop_handle_at(0.9, 0.9, &c, 0.05), None);
    }

    fn square_layer(side: u32) -> Layer {
        Layer::image(Arc::new(RgbaImage::from_pixel(side, side, Rgba([0, 0, 255, 255]))))
    }

    #[test]
    fn topmost_layer_wins_overlap() {
        let mut store = LayerStore::new();
        store.append(square_layer(20));
        store.append(square_layer(20));
        let hit = layer_at(&store, None, 0.5, 0.5, (100.0, 100.0), 0.05);
        assert_eq!(hit, Some(LayerHit { index: 1, kind: HitKind::Move }));
        assert_eq!(layer_at(&store, None, 0.05, 0.05, (100.0, 100.0), 0.05), None);
    }

    #[test]
    fn resize_corner_only_for_selected_layer() {
        let mut store = LayerStore::new();
        store.append(square_layer(20));
        // bottom-right corner of a 20px layer centred in 100px is (0.6, 0.6)
        let unselected = layer_at(&store, None, 0.6, 0.6, (100.0, 100.0), 0.05);
        assert_eq!(unselected, Some(LayerHit { index: 0, kind: HitKind::Move }));
        let selected = layer_at(&store, Some(0), 0.62, 0.62, (100.0, 100.0), 0.05);
        assert_eq!(selected, Some(LayerHit { index: 0, kind: HitKind::Resize }));
        assert_eq!(CursorHint::from(selected), CursorHint::Resize);
    }

    #[test]
    fn rotation_does_not_change_hit_box() {
        let mut store = LayerStore::new();
        store.append(square_layer(20).with_rotation(std::f32::consts::FRAC_PI_4));
        assert!(layer_at(&store, None, 0.41, 0.41, (100.0, 100.0), 0.05).is_some());
    }

    #[test]
    fn caption_proximity_prefers_top() {
        let top = Caption::top();
        let mut bottom = Caption::bottom();
        assert_eq!(caption_at(0.12, &top, &bottom, 500.0), Some(CaptionSlot::Top));
        assert_eq!(caption_at(0.85, &top, &bottom, 500.0), Some(CaptionSlot::Bottom));
        assert_eq!(caption_at(0.5, &top, &bottom, 500.0), None);
        bottom.y = 0.15;
        assert_eq!(caption_at(0.13, &top, &bottom, 500.0), Some(CaptionSlot::Top));
        // Large fonts widen the grab band beyond the 0.1 floor
        let mut big = Caption::top();
        big.font_size = 200.0;
        assert_eq!(caption_at(0.3, &big, &bottom, 500.0), Some(CaptionSlot::Top));
    }
}
