use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use rayon::prelude::*;

use crate::canvas::CoverageMask;
use crate::settings::EngineSettings;

/// Lay out a single line of text, left-aligned at x = 0 with the baseline at
/// `ascent`.  Returns the positioned glyphs and the advance width.
pub fn layout_text(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Coverage of a line of text plus its outline, centred on local `(0, 0)`.
#[derive(Clone, Debug)]
pub struct OutlinedText {
    /// Glyph interiors.
    pub fill: CoverageMask,
    /// Glyphs grown by half the outline width on every side.
    pub stroke: CoverageMask,
    /// Ink bounding box of the glyphs, without outline.
    pub ink_width: f32,
    pub ink_height: f32,
}

/// Rasterize `text` and build its outline mask.
///
/// Returns `None` when the text has no visible ink (empty or whitespace).
pub fn outlined_text(font: &FontArc, text: &str, font_size: f32, outline_width: f32) -> Option<OutlinedText> {
    let (glyphs, _) = layout_text(font, text, font_size);

    let outlined: Vec<_> = glyphs
        .iter()
        .filter_map(|&(id, gx, gy)| font.outline_glyph(id.with_scale_and_position(font_size, point(gx, gy))))
        .collect();
    if outlined.is_empty() {
        return None;
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for g in &outlined {
        let b = g.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return None;
    }

    let radius = (outline_width * 0.5).max(0.0);
    let pad = radius.ceil() as u32 + 1;
    let ink_w = max_x - min_x;
    let ink_h = max_y - min_y;
    let buf_w = ink_w.ceil() as u32 + pad * 2;
    let buf_h = ink_h.ceil() as u32 + pad * 2;

    let mut fill = CoverageMask::new(buf_w, buf_h, -ink_w * 0.5 - pad as f32, -ink_h * 0.5 - pad as f32);
    for g in &outlined {
        let b = g.px_bounds();
        let ox = (b.min.x - min_x) as i32 + pad as i32;
        let oy = (b.min.y - min_y) as i32 + pad as i32;
        g.draw(|px, py, cov| {
            let ix = ox + px as i32;
            let iy = oy + py as i32;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                fill.data[idx] = (fill.data[idx] + cov).min(1.0);
            }
        });
    }

    let stroke = dilate(&fill, radius);
    Some(OutlinedText { fill, stroke, ink_width: ink_w, ink_height: ink_h })
}

/// Grow a coverage mask by `radius` pixels with an anti-aliased edge.
fn dilate(mask: &CoverageMask, radius: f32) -> CoverageMask {
    let mut out = CoverageMask::new(mask.width, mask.height, mask.origin_x, mask.origin_y);
    let w = mask.width as usize;
    if w == 0 || radius <= 0.0 {
        out.data.copy_from_slice(&mask.data);
        return out;
    }
    let reach = radius.ceil() as i32 + 1;

    // Disc offsets with their edge weight, computed once.
    let mut disc = Vec::new();
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let d = ((dx * dx + dy * dy) as f32).sqrt();
            let weight = (radius + 0.5 - d).clamp(0.0, 1.0);
            if weight > 0.0 {
                disc.push((dx, dy, weight));
            }
        }
    }

    out.data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, dst) in row.iter_mut().enumerate() {
            let mut best = 0.0f32;
            for &(dx, dy, weight) in &disc {
                let v = mask.get(x as i32 + dx, y as i32 + dy) * weight;
                if v > best {
                    best = v;
                    if best >= 1.0 {
                        break;
                    }
                }
            }
            *dst = best;
        }
    });
    out
}

/// Fonts used by the compositor.  Either may be missing on a bare system;
/// text that has no font is skipped.
#[derive(Clone, Default)]
pub struct FontSet {
    pub body: Option<FontArc>,
    pub caption: Option<FontArc>,
}

impl FontSet {
    pub fn load(settings: &EngineSettings) -> Self {
        let body = load_system_font(&settings.font_family, settings.font_weight);
        if body.is_none() {
            log_warn!("Font '{}' not found; text layers will not render", settings.font_family);
        }
        let caption = load_system_font(&settings.caption_font_family, settings.font_weight);
        if caption.is_none() {
            log_info!(
                "Caption font '{}' not found; falling back to '{}'",
                settings.caption_font_family,
                settings.font_family
            );
        }
        Self { body, caption }
    }

    /// Font for top/bottom captions, falling back to the body font.
    pub fn caption_font(&self) -> Option<&FontArc> {
        self.caption.as_ref().or(self.body.as_ref())
    }
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet")
            .field("body", &self.body.is_some())
            .field("caption", &self.caption.is_some())
            .finish()
    }
}

/// Load a font by family name and weight from the system, falling back to
/// the default sans-serif family.
/// `weight` is a CSS-style weight value (100=Thin, 400=Regular, 700=Bold, etc.)
pub fn load_system_font(family: &str, weight: u16) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);

    let source = SystemSource::new();
    let handle = source
        .select_best_match(&[FamilyName::Title(family.to_string()), FamilyName::SansSerif], &props)
        .ok()?;

    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any_font() -> Option<FontArc> {
        load_system_font("DejaVu Sans", 700)
    }

    #[test]
    fn dilate_grows_a_single_pixel() {
        let mut mask = CoverageMask::new(9, 9, 0.0, 0.0);
        mask.data[4 * 9 + 4] = 1.0;
        let grown = dilate(&mask, 2.0);
        assert_eq!(grown.get(4, 4), 1.0);
        assert_eq!(grown.get(5, 4), 1.0);
        assert_eq!(grown.get(6, 4), 0.5);
        assert_eq!(grown.get(0, 0), 0.0);
        assert_eq!(dilate(&mask, 0.0).data, mask.data);
    }

    #[test]
    fn blank_text_has_no_ink() {
        let Some(font) = any_font() else { return };
        assert!(outlined_text(&font, "", 48.0, 4.0).is_none());
        assert!(outlined_text(&font, "   ", 48.0, 4.0).is_none());
    }

    #[test]
    fn outline_covers_fill_and_is_centred() {
        let Some(font) = any_font() else { return };
        let text = outlined_text(&font, "HELLO", 48.0, 4.0).expect("ink");
        assert!(text.ink_width > text.ink_height);
        assert_eq!((text.fill.width, text.fill.height), (text.stroke.width, text.stroke.height));
        let covered = |m: &CoverageMask| m.data.iter().filter(|&&c| c > 0.5).count();
        assert!(covered(&text.stroke) > covered(&text.fill));
        let cx = text.fill.origin_x + text.fill.width as f32 * 0.5;
        let cy = text.fill.origin_y + text.fill.height as f32 * 0.5;
        assert!(cx.abs() <= 1.0 && cy.abs() <= 1.0);
    }

    #[test]
    fn layout_advances_left_to_right() {
        let Some(font) = any_font() else { return };
        let (glyphs, width) = layout_text(&font, "ab", 32.0);
        assert_eq!(glyphs.len(), 2);
        assert!(glyphs[1].1 > glyphs[0].1);
        assert!(width > glyphs[1].1);
    }
}
