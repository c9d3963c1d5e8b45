// ============================================================================
// RASTER CANVAS: blend modes, affine transforms and the CPU paint surface
// ============================================================================
//
// The compositor and overlay renderer only talk to the `Paint` trait.
// `RasterCanvas` is the CPU implementation backed by an `RgbaImage`; every
// operation walks the destination rows in parallel via rayon and samples the
// source through the inverse transform at pixel centres.
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// BLEND MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
        }
    }

    /// Case-insensitive lookup used by the CLI.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Blend one colour channel (0..1) of `top` over `base`.
    fn mix_channel(&self, base: f32, top: f32) -> f32 {
        match self {
            BlendMode::Normal => top,
            BlendMode::Multiply => base * top,
            BlendMode::Screen => 1.0 - (1.0 - base) * (1.0 - top),
            BlendMode::Overlay => overlay_channel(base, top),
        }
    }
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

/// Composite `top` over `base` with the given operator and paint alpha.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel, nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }

    // Fast path: Normal blend, full opacity, fully opaque top pixel: overwrite
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    // Where the backdrop is transparent the operator degenerates to the source colour.
    let r = mode.mix_channel(base_r, top_r) * base_a + top_r * (1.0 - base_a);
    let g = mode.mix_channel(base_g, top_g) * base_a + top_g * (1.0 - base_a);
    let b = mode.mix_channel(base_b, top_b) * base_a + top_b * (1.0 - base_a);

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_g * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_b * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Convert a 0..1 RGBA paint colour to bytes, scaling alpha by `coverage`.
fn paint_color(color: [f32; 4], coverage: f32) -> Rgba<u8> {
    Rgba([
        (color[0] * 255.0).round().clamp(0.0, 255.0) as u8,
        (color[1] * 255.0).round().clamp(0.0, 255.0) as u8,
        (color[2] * 255.0).round().clamp(0.0, 255.0) as u8,
        (color[3] * coverage * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// AFFINE TRANSFORM
// ============================================================================

/// 2D affine map `(x, y) → (a·x + c·y + e, b·x + d·y + f)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn translate(tx: f32, ty: f32) -> Self {
        Affine { e: tx, f: ty, ..Self::IDENTITY }
    }

    pub fn rotate(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Affine { a: c, b: s, c: -s, d: c, e: 0.0, f: 0.0 }
    }

    pub fn scale(s: f32) -> Self {
        Affine { a: s, d: s, ..Self::IDENTITY }
    }

    /// `self ∘ inner`: apply `inner` first, then `self`.
    /// Chaining `translate(..).then(rotate(..)).then(scale(..))` mirrors the
    /// usual save/translate/rotate/scale sequence of a 2D drawing context.
    pub fn then(&self, inner: Affine) -> Affine {
        Affine {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Inverse map, or `None` for a singular (zero-scale) transform.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }
}

// ============================================================================
// COVERAGE MASK
// ============================================================================

/// Single-channel coverage (0..1) positioned in a local coordinate space.
/// Pixel `(0, 0)` of the mask covers local `[origin_x, origin_x + 1)`.
#[derive(Clone, Debug, Default)]
pub struct CoverageMask {
    pub width: u32,
    pub height: u32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub data: Vec<f32>,
}

impl CoverageMask {
    pub fn new(width: u32, height: u32, origin_x: f32, origin_y: f32) -> Self {
        Self {
            width,
            height,
            origin_x,
            origin_y,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            0.0
        } else {
            self.data[y as usize * self.width as usize + x as usize]
        }
    }

    /// Bilinear sample at a local-space position.
    fn sample(&self, lx: f32, ly: f32) -> f32 {
        let sx = lx - self.origin_x - 0.5;
        let sy = ly - self.origin_y - 0.5;
        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);
        let top = self.get(x0, y0) + (self.get(x0 + 1, y0) - self.get(x0, y0)) * fx;
        let bot = self.get(x0, y0 + 1) + (self.get(x0 + 1, y0 + 1) - self.get(x0, y0 + 1)) * fx;
        top + (bot - top) * fy
    }
}

// ============================================================================
// PAINT CAPABILITY
// ============================================================================

/// Drawing operations the compositor and overlay renderer rely on.
/// Colours are straight-alpha RGBA in 0..1.
pub trait Paint {
    fn size(&self) -> (u32, u32);

    /// Draw `src` with its top-left pixel at local `(0, 0)`, mapped through
    /// `transform`, combined with `mode` and paint alpha `alpha`.
    fn draw_image(&mut self, src: &RgbaImage, transform: &Affine, mode: BlendMode, alpha: f32);

    /// Fill `mask` (in local space) with a solid colour through `transform`.
    fn fill_mask(&mut self, mask: &CoverageMask, transform: &Affine, color: [f32; 4], mode: BlendMode);

    /// Axis-aligned rectangle fill in canvas pixels, partial pixels anti-aliased.
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [f32; 4]);

    /// Stroke a polyline (optionally closed) of the given line width.
    fn stroke_path(&mut self, points: &[(f32, f32)], closed: bool, width: f32, color: [f32; 4]);

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: [f32; 4]);
}

/// CPU paint surface.
#[derive(Clone, Debug)]
pub struct RasterCanvas {
    image: RgbaImage,
}

impl RasterCanvas {
    /// Transparent canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height) }
    }

    /// Start from a copy of `background` painted at 1:1.
    pub fn from_image(background: &RgbaImage) -> Self {
        Self { image: background.clone() }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Destination pixel bounds (x0, y0, x1, y1) of a local rect under `transform`.
    fn device_bounds(&self, transform: &Affine, x: f32, y: f32, w: f32, h: f32) -> Option<(u32, u32, u32, u32)> {
        let corners = [
            transform.apply(x, y),
            transform.apply(x + w, y),
            transform.apply(x, y + h),
            transform.apply(x + w, y + h),
        ];
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for (cx, cy) in corners {
            min_x = min_x.min(cx);
            min_y = min_y.min(cy);
            max_x = max_x.max(cx);
            max_y = max_y.max(cy);
        }
        self.clip_bounds(min_x, min_y, max_x, max_y)
    }

    fn clip_bounds(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = (self.image.width() as f32, self.image.height() as f32);
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        let x0 = min_x.floor().clamp(0.0, w) as u32;
        let y0 = min_y.floor().clamp(0.0, h) as u32;
        let x1 = max_x.ceil().clamp(0.0, w) as u32;
        let y1 = max_y.ceil().clamp(0.0, h) as u32;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }

    /// Run `shade` for every destination pixel inside `bounds`, rows in parallel.
    /// `shade` returns the source pixel to blend, or `None` to leave it untouched.
    fn shade_region<F>(&mut self, bounds: (u32, u32, u32, u32), mode: BlendMode, alpha: f32, shade: F)
    where
        F: Fn(u32, u32) -> Option<Rgba<u8>> + Sync,
    {
        let (x0, y0, x1, y1) = bounds;
        let row_bytes = self.image.width() as usize * 4;
        let raw: &mut [u8] = &mut self.image;
        raw.par_chunks_mut(row_bytes)
            .enumerate()
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .for_each(|(py, row)| {
                for px in x0..x1 {
                    let Some(top) = shade(px, py as u32) else { continue };
                    let i = px as usize * 4;
                    let base = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                    let out = blend_pixel(base, top, mode, alpha);
                    row[i..i + 4].copy_from_slice(&out.0);
                }
            });
    }
}

/// Bilinear sample with transparent outside the image.
fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let (w, h) = (img.width() as i32, img.height() as i32);

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            // Premultiply so transparent neighbours don't bleed black into edges.
            let a = p[3] as f32 / 255.0;
            [p[0] as f32 * a, p[1] as f32 * a, p[2] as f32 * a, p[3] as f32]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut acc = [0f32; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        acc[c] = lerp(top, bot, fy);
    }
    let a = acc[3];
    if a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let un = 255.0 / a;
    Rgba([
        (acc[0] * un).round().clamp(0.0, 255.0) as u8,
        (acc[1] * un).round().clamp(0.0, 255.0) as u8,
        (acc[2] * un).round().clamp(0.0, 255.0) as u8,
        a.round().clamp(0.0, 255.0) as u8,
    ])
}

/// Distance from `p` to the segment `a`–`b`.
fn segment_distance(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + dx * t, a.1 + dy * t);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Length of the overlap between the unit pixel span `[p, p+1)` and `[lo, hi)`.
fn span_overlap(p: u32, lo: f32, hi: f32) -> f32 {
    let p = p as f32;
    ((p + 1.0).min(hi) - p.max(lo)).clamp(0.0, 1.0)
}

impl Paint for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    fn draw_image(&mut self, src: &RgbaImage, transform: &Affine, mode: BlendMode, alpha: f32) {
        let Some(inverse) = transform.invert() else { return };
        let (sw, sh) = (src.width() as f32, src.height() as f32);
        let Some(bounds) = self.device_bounds(transform, 0.0, 0.0, sw, sh) else { return };
        self.shade_region(bounds, mode, alpha, |px, py| {
            let (u, v) = inverse.apply(px as f32 + 0.5, py as f32 + 0.5);
            if u < -0.5 || v < -0.5 || u > sw + 0.5 || v > sh + 0.5 {
                return None;
            }
            Some(bilinear_sample(src, u - 0.5, v - 0.5))
        });
    }

    fn fill_mask(&mut self, mask: &CoverageMask, transform: &Affine, color: [f32; 4], mode: BlendMode) {
        if mask.is_empty() {
            return;
        }
        let Some(inverse) = transform.invert() else { return };
        let Some(bounds) = self.device_bounds(
            transform,
            mask.origin_x - 1.0,
            mask.origin_y - 1.0,
            mask.width as f32 + 2.0,
            mask.height as f32 + 2.0,
        ) else {
            return;
        };
        self.shade_region(bounds, mode, 1.0, |px, py| {
            let (lx, ly) = inverse.apply(px as f32 + 0.5, py as f32 + 0.5);
            let cov = mask.sample(lx, ly);
            if cov <= 0.001 {
                return None;
            }
            Some(paint_color(color, cov.min(1.0)))
        });
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [f32; 4]) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let Some(bounds) = self.clip_bounds(x, y, x + w, y + h) else { return };
        self.shade_region(bounds, BlendMode::Normal, 1.0, |px, py| {
            let cov = span_overlap(px, x, x + w) * span_overlap(py, y, y + h);
            (cov > 0.0).then(|| paint_color(color, cov))
        });
    }

    fn stroke_path(&mut self, points: &[(f32, f32)], closed: bool, width: f32, color: [f32; 4]) {
        if points.len() < 2 || width <= 0.0 {
            return;
        }
        let mut segments: Vec<((f32, f32), (f32, f32))> = points.windows(2).map(|w| (w[0], w[1])).collect();
        if closed {
            segments.push((points[points.len() - 1], points[0]));
        }
        let half = width * 0.5;
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for &(px, py) in points {
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
        }
        let pad = half + 1.0;
        let Some(bounds) = self.clip_bounds(min_x - pad, min_y - pad, max_x + pad, max_y + pad) else { return };
        self.shade_region(bounds, BlendMode::Normal, 1.0, |px, py| {
            let p = (px as f32 + 0.5, py as f32 + 0.5);
            let dist = segments
                .iter()
                .map(|&(a, b)| segment_distance(p, a, b))
                .fold(f32::MAX, f32::min);
            let cov = (half + 0.5 - dist).clamp(0.0, 1.0);
            (cov > 0.0).then(|| paint_color(color, cov))
        });
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: [f32; 4]) {
        if radius <= 0.0 {
            return;
        }
        let pad = radius + 1.0;
        let Some(bounds) = self.clip_bounds(cx - pad, cy - pad, cx + pad, cy + pad) else { return };
        self.shade_region(bounds, BlendMode::Normal, 1.0, |px, py| {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            let cov = (radius + 0.5 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
            (cov > 0.0).then(|| paint_color(color, cov))
        });
    }
}
