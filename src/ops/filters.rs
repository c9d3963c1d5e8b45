// ============================================================================
// PIXEL FILTERS: whole-image post-processes applied after compositing
// ============================================================================
//
// Both filters take the source by reference and return a fresh buffer.
// Channel arithmetic truncates toward zero before clamping to 0..255, and
// alpha is never touched.
// ============================================================================

use image::RgbaImage;
use image::imageops::{self, FilterType};
use rayon::prelude::*;

use crate::settings::EngineSettings;

/// Run `f` over every RGB triple of a copy of `src`, rows in parallel.
/// `f` receives `(x, y, [r, g, b])` and returns the new triple.
fn map_rgb<F>(src: &RgbaImage, f: F) -> RgbaImage
where
    F: Fn(u32, u32, [u8; 3]) -> [u8; 3] + Sync,
{
    let mut out = src.clone();
    let w = out.width() as usize;
    if w == 0 || out.height() == 0 {
        return out;
    }
    let row_bytes = w * 4;
    let raw: &mut [u8] = &mut out;
    raw.par_chunks_mut(row_bytes).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let i = x * 4;
            let rgb = f(x as u32, y as u32, [row[i], row[i + 1], row[i + 2]]);
            row[i..i + 3].copy_from_slice(&rgb);
        }
    });
    out
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    // `as i32` truncates toward zero, matching integer channel maths
    (v as i32).clamp(0, 255) as u8
}

/// Pull each channel toward the pixel's luminance by `1 - saturation`, then
/// stretch around mid-grey by `contrast`.  `(1.0, 1.0)` is the identity.
pub fn saturation_contrast(src: &RgbaImage, saturation: f32, contrast: f32) -> RgbaImage {
    let keep_grey = 1.0 - saturation;
    map_rgb(src, |_, _, [r, g, b]| {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let gray = 0.299 * r + 0.587 * g + 0.114 * b;
        let adjust = |c: f32| {
            let c = gray * keep_grey + c * saturation;
            clamp_u8((c - 128.0) * contrast + 128.0)
        };
        [adjust(r), adjust(g), adjust(b)]
    })
}

/// Parameters of the deep-fry degradation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeepFry {
    /// Per-channel noise is drawn uniformly from `-noise..=noise`.
    pub noise: i32,
    pub contrast: f32,
    /// Fraction of each dimension kept by the nearest-neighbour downsample.
    pub downsample: f32,
    pub seed: u32,
}

impl Default for DeepFry {
    fn default() -> Self {
        Self { noise: 30, contrast: 2.0, downsample: 0.25, seed: 1 }
    }
}

impl DeepFry {
    /// Parameters from the engine settings.  A zero `noise_seed` draws a
    /// fresh seed so repeated renders get different grain.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let seed = match settings.noise_seed {
            0 => fresh_seed(),
            s => s,
        };
        Self {
            noise: settings.deep_fry_noise.max(0),
            contrast: settings.deep_fry_contrast,
            downsample: settings.deep_fry_downsample,
            seed,
        }
    }
}

fn fresh_seed() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(0x5EED);
    hash_u32(nanos).max(1)
}

/// Simple hash for deterministic noise.
#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

/// Uniform integer in `-level..=level` for one channel of one pixel.
#[inline]
fn noise_at(x: u32, y: u32, channel: u32, seed: u32, level: i32) -> i32 {
    if level <= 0 {
        return 0;
    }
    let span = (level as u32) * 2 + 1;
    let h = hash_u32(x.wrapping_mul(3).wrapping_add(channel) ^ hash_u32(y ^ seed.rotate_left(16)) ^ seed);
    (h % span) as i32 - level
}

/// Noise, hard contrast, then a nearest-neighbour shrink and blow-up that
/// leaves blocky artefacts.  Output has the same size as `src`.
pub fn deep_fry(src: &RgbaImage, params: &DeepFry) -> RgbaImage {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return src.clone();
    }

    let DeepFry { noise, contrast, downsample, seed } = *params;
    let fried = map_rgb(src, |x, y, rgb| {
        let mut out = [0u8; 3];
        for (c, (dst, v)) in out.iter_mut().zip(rgb).enumerate() {
            let val = v as i32 + noise_at(x, y, c as u32, seed, noise);
            *dst = clamp_u8((val as f32 - 128.0) * contrast + 128.0);
        }
        out
    });

    let small_w = ((w as f32 * downsample) as u32).max(1);
    let small_h = ((h as f32 * downsample) as u32).max(1);
    let shrunk = imageops::resize(&fried, small_w, small_h, FilterType::Nearest);
    drop(fried);
    imageops::resize(&shrunk, w, h, FilterType::Nearest)
}
