// ============================================================================
// OVERLAY: editor annotations drawn over a copy of the composite
// ============================================================================

use image::RgbaImage;

use crate::canvas::{Affine, Paint, RasterCanvas};
use crate::crop::CropRect;
use crate::layers::Layer;
use crate::settings::EngineSettings;

const CROP_SHADE: [f32; 4] = [0.0, 0.0, 0.0, 0.6];
const CROP_BORDER: [f32; 4] = [1.0, 1.0, 1.0, 0.9];
const CROP_GRID: [f32; 4] = [1.0, 1.0, 1.0, 0.3];
const CROP_HANDLE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const SELECTION: [f32; 4] = [0.4, 0.2, 0.8, 0.8];

/// Annotate a copy of `composite`.
///
/// With a crop rectangle the crop view is drawn and `selected` is ignored;
/// otherwise the selected layer gets its rotated bounding box.
pub fn render_overlay(
    composite: &RgbaImage,
    selected: Option<&Layer>,
    crop: Option<&CropRect>,
    settings: &EngineSettings,
) -> RgbaImage {
    let mut canvas = RasterCanvas::from_image(composite);
    if let Some(crop) = crop {
        draw_crop_view(&mut canvas, crop, settings.handle_dot_radius);
    } else if let Some(layer) = selected {
        draw_selection(&mut canvas, layer);
    }
    canvas.into_image()
}

/// Shaded surround, border, rule-of-thirds grid and the eight handles.
pub fn draw_crop_view<P: Paint>(canvas: &mut P, crop: &CropRect, handle_radius: f32) {
    let (w, h) = canvas.size();
    let (w, h) = (w as f32, h as f32);
    let x = crop.x * w;
    let y = crop.y * h;
    let cw = crop.width * w;
    let ch = crop.height * h;

    if y > 0.0 {
        canvas.fill_rect(0.0, 0.0, w, y, CROP_SHADE);
    }
    if y + ch < h {
        canvas.fill_rect(0.0, y + ch, w, h - (y + ch), CROP_SHADE);
    }
    if x > 0.0 {
        canvas.fill_rect(0.0, y, x, ch, CROP_SHADE);
    }
    if x + cw < w {
        canvas.fill_rect(x + cw, y, w - (x + cw), ch, CROP_SHADE);
    }

    let corners = [(x, y), (x + cw, y), (x + cw, y + ch), (x, y + ch)];
    canvas.stroke_path(&corners, true, 2.0, CROP_BORDER);

    for t in [1.0 / 3.0, 2.0 / 3.0] {
        canvas.stroke_path(&[(x + cw * t, y), (x + cw * t, y + ch)], false, 1.0, CROP_GRID);
        canvas.stroke_path(&[(x, y + ch * t), (x + cw, y + ch * t)], false, 1.0, CROP_GRID);
    }

    let handles = [
        (x, y),
        (x + cw, y),
        (x, y + ch),
        (x + cw, y + ch),
        (x + cw / 2.0, y),
        (x + cw / 2.0, y + ch),
        (x, y + ch / 2.0),
        (x + cw, y + ch / 2.0),
    ];
    for (hx, hy) in handles {
        canvas.fill_circle(hx, hy, handle_radius, CROP_HANDLE);
    }
}

/// Rotated box around a layer's scaled footprint.
pub fn draw_selection<P: Paint>(canvas: &mut P, layer: &Layer) {
    let (w, h) = canvas.size();
    let (bw, bh) = layer.scaled_size();
    let at = Affine::translate(layer.x * w as f32, layer.y * h as f32).then(Affine::rotate(layer.rotation));
    let corners = [
        at.apply(-bw / 2.0, -bh / 2.0),
        at.apply(bw / 2.0, -bh / 2.0),
        at.apply(bw / 2.0, bh / 2.0),
        at.apply(-bw / 2.0, bh / 2.0),
    ];
    canvas.stroke_path(&corners, true, 2.0, SELECTION);
}
