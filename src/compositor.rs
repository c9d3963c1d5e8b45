// ============================================================================
// COMPOSITOR: flattens background, layers and captions into one image
// ============================================================================
//
// Paint order: background at 1:1, layers back to front, captions, then the
// optional post effects (cinematic before deep-fry, always).  Text layers
// refresh their cached `width`/`height` on every pass.
// ============================================================================

use ab_glyph::FontArc;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::canvas::{Affine, BlendMode, Paint, RasterCanvas};
use crate::layers::{Caption, Captions, Layer, LayerContent, LayerStore};
use crate::ops::filters::{self, DeepFry};
use crate::ops::text::{self, FontSet};
use crate::settings::EngineSettings;

/// Whole-image effects applied after every layer is painted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEffects {
    pub cinematic: bool,
    pub deep_fry: bool,
}

const OUTLINE: [f32; 3] = [0.0, 0.0, 0.0];
const FILL: [f32; 3] = [1.0, 1.0, 1.0];

/// Local → canvas transform for a layer centred at its normalized position.
pub fn layer_transform(layer: &Layer, canvas_w: u32, canvas_h: u32) -> Affine {
    Affine::translate(layer.x * canvas_w as f32, layer.y * canvas_h as f32)
        .then(Affine::rotate(layer.rotation))
        .then(Affine::scale(layer.scale))
}

/// Draw an outlined line of text centred on the local origin of `transform`.
/// Returns the ink size, or `None` when nothing was visible.
fn paint_outlined_text<P: Paint>(
    canvas: &mut P,
    font: &FontArc,
    text: &str,
    font_size: f32,
    outline_ratio: f32,
    transform: &Affine,
    opacity: f32,
    mode: BlendMode,
) -> Option<(f32, f32)> {
    let shaped = text::outlined_text(font, text, font_size, font_size * outline_ratio)?;
    let [r, g, b] = OUTLINE;
    canvas.fill_mask(&shaped.stroke, transform, [r, g, b, opacity], mode);
    let [r, g, b] = FILL;
    canvas.fill_mask(&shaped.fill, transform, [r, g, b, opacity], mode);
    Some((shaped.ink_width, shaped.ink_height))
}

/// Paint one layer.  Text layers store their measured size back.
fn paint_layer<P: Paint>(canvas: &mut P, layer: &mut Layer, fonts: &FontSet, settings: &EngineSettings) {
    let (cw, ch) = canvas.size();
    let base = layer_transform(layer, cw, ch);
    match &layer.content {
        LayerContent::Image(pixels) => {
            let centred = base.then(Affine::translate(-layer.width / 2.0, -layer.height / 2.0));
            canvas.draw_image(pixels, &centred, layer.blend_mode, layer.opacity);
        }
        LayerContent::Text { text, font_size } => {
            let Some(font) = fonts.body.as_ref() else {
                return;
            };
            let (ink_w, ink_h) = paint_outlined_text(
                canvas,
                font,
                text,
                *font_size,
                settings.text_outline_ratio,
                &base,
                layer.opacity,
                layer.blend_mode,
            )
            .unwrap_or((0.0, 0.0));
            layer.width = ink_w + settings.text_padding;
            layer.height = ink_h + settings.text_padding;
        }
    }
}

fn paint_caption<P: Paint>(canvas: &mut P, caption: &Caption, fonts: &FontSet, settings: &EngineSettings) {
    if caption.text.is_empty() {
        return;
    }
    let Some(font) = fonts.caption_font() else {
        return;
    };
    let (cw, ch) = canvas.size();
    let at = Affine::translate(caption.x * cw as f32, caption.y * ch as f32);
    paint_outlined_text(
        canvas,
        font,
        &caption.text.to_uppercase(),
        caption.font_size,
        settings.caption_outline_ratio,
        &at,
        1.0,
        BlendMode::Normal,
    );
}

/// Paint every layer, then the captions, onto `canvas`.
pub fn paint_document<P: Paint>(
    canvas: &mut P,
    layers: &mut LayerStore,
    captions: &Captions,
    fonts: &FontSet,
    settings: &EngineSettings,
) {
    for layer in layers.iter_mut() {
        paint_layer(canvas, layer, fonts, settings);
    }
    for caption in captions.iter() {
        paint_caption(canvas, caption, fonts, settings);
    }
}

/// Flatten the document into a new image the size of `background`.
///
/// Returns `None` when there is no background.
pub fn render_composite(
    background: Option<&RgbaImage>,
    layers: &mut LayerStore,
    captions: &Captions,
    effects: PostEffects,
    fonts: &FontSet,
    settings: &EngineSettings,
) -> Option<RgbaImage> {
    let background = background?;
    if fonts.body.is_none() && layers.iter().any(Layer::is_text) {
        log_warn!("No font loaded; skipping text layers");
    }

    let mut canvas = RasterCanvas::from_image(background);
    paint_document(&mut canvas, layers, captions, fonts, settings);
    let mut out = canvas.into_image();

    if effects.cinematic {
        out = filters::saturation_contrast(&out, settings.cinematic_saturation, settings.cinematic_contrast);
    }
    if effects.deep_fry {
        out = filters::deep_fry(&out, &DeepFry::from_settings(settings));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::Arc;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn white_bg() -> RgbaImage {
        RgbaImage::from_pixel(100, 100, WHITE)
    }

    fn red_layer(w: u32, h: u32) -> Layer {
        Layer::image(Arc::new(RgbaImage::from_pixel(w, h, RED)))
    }

    fn render(bg: &RgbaImage, layers: &mut LayerStore, effects: PostEffects) -> RgbaImage {
        let settings = EngineSettings { noise_seed: 11, ..EngineSettings::default() };
        render_composite(Some(bg), layers, &Captions::default(), effects, &FontSet::default(), &settings)
            .expect("background present")
    }

    #[test]
    fn centred_red_square_over_white() {
        let mut layers = LayerStore::new();
        layers.append(red_layer(20, 20));
        let out = render(&white_bg(), &mut layers, PostEffects::default());
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(*out.get_pixel(50, 50), RED);
        assert_eq!(*out.get_pixel(5, 5), WHITE);
    }

    #[test]
    fn missing_background_renders_nothing() {
        let mut layers = LayerStore::new();
        layers.append(red_layer(4, 4));
        let out = render_composite(
            None,
            &mut layers,
            &Captions::default(),
            PostEffects::default(),
            &FontSet::default(),
            &EngineSettings::default(),
        );
        assert!(out.is_none());
    }

    #[test]
    fn rotation_and_scale_move_the_footprint() {
        // 40×10 bar rotated a quarter turn stands upright
        let mut layers = LayerStore::new();
        layers.append(red_layer(40, 10).with_rotation(std::f32::consts::FRAC_PI_2));
        let out = render(&white_bg(), &mut layers, PostEffects::default());
        assert_eq!(*out.get_pixel(50, 35), RED);
        assert_eq!(*out.get_pixel(35, 50), WHITE);

        let mut layers = LayerStore::new();
        layers.append(red_layer(10, 10).with_scale(4.0));
        let out = render(&white_bg(), &mut layers, PostEffects::default());
        assert_eq!(*out.get_pixel(32, 32), RED);
        assert_eq!(*out.get_pixel(25, 25), WHITE);
    }

    #[test]
    fn later_layers_paint_over_earlier_ones() {
        let mut layers = LayerStore::new();
        layers.append(red_layer(20, 20));
        layers.append(Layer::image(Arc::new(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255])))));
        let out = render(&white_bg(), &mut layers, PostEffects::default());
        assert_eq!(*out.get_pixel(50, 50), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(42, 42), RED);
    }

    #[test]
    fn opacity_and_blend_mode_reach_the_pixels() {
        let mut layers = LayerStore::new();
        layers.append(red_layer(20, 20).with_opacity(0.5));
        let out = render(&white_bg(), &mut layers, PostEffects::default());
        let p = out.get_pixel(50, 50);
        assert_eq!(p[0], 255);
        assert!((p[1] as i32 - 128).abs() <= 1);

        let grey = RgbaImage::from_pixel(100, 100, Rgba([100, 100, 100, 255]));
        let mut layers = LayerStore::new();
        layers.append(Layer::image(Arc::new(RgbaImage::from_pixel(20, 20, WHITE))).with_blend_mode(BlendMode::Multiply));
        let out = render(&grey, &mut layers, PostEffects::default());
        assert_eq!(*out.get_pixel(50, 50), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn every_blend_mode_reaches_the_composite() {
        let base = Rgba([200, 60, 30, 255]);
        let top = Rgba([90, 180, 240, 255]);
        let bg = RgbaImage::from_pixel(100, 100, base);
        for &mode in BlendMode::all() {
            let mut layers = LayerStore::new();
            layers.append(Layer::image(Arc::new(RgbaImage::from_pixel(20, 20, top))).with_blend_mode(mode));
            let out = render(&bg, &mut layers, PostEffects::default());
            let expected = crate::canvas::blend_pixel(base, top, mode, 1.0);
            assert_eq!(*out.get_pixel(50, 50), expected, "{}", mode.name());
            assert_eq!(*out.get_pixel(5, 5), base);
        }

        // Screen brightens every channel, Overlay follows the backdrop
        let screen = crate::canvas::blend_pixel(base, top, BlendMode::Screen, 1.0);
        assert!((0..3).all(|c| screen[c] >= base[c].max(top[c])));
        let overlay = crate::canvas::blend_pixel(base, top, BlendMode::Overlay, 1.0);
        assert!(overlay[0] > top[0] && overlay[1] < top[1]);
    }

    #[test]
    fn text_without_a_font_is_skipped() {
        let mut layers = LayerStore::new();
        layers.append(Layer::text("hello", 24.0));
        let bg = white_bg();
        let out = render(&bg, &mut layers, PostEffects::default());
        assert_eq!(out, bg);
        assert_eq!(layers.get(0).unwrap().width, 0.0);
    }

    #[test]
    fn text_layer_caches_its_measured_size() {
        let settings = EngineSettings::default();
        let fonts = FontSet::load(&settings);
        if fonts.body.is_none() {
            return;
        }
        let mut layers = LayerStore::new();
        layers.append(Layer::text("Hi", 30.0));
        let bg = RgbaImage::from_pixel(200, 100, Rgba([40, 120, 40, 255]));
        let out = render_composite(Some(&bg), &mut layers, &Captions::default(), PostEffects::default(), &fonts, &settings)
            .unwrap();
        let layer = layers.get(0).unwrap();
        assert!(layer.width > settings.text_padding);
        assert!(layer.height > settings.text_padding);
        assert_ne!(out, bg);
    }

    #[test]
    fn cinematic_changes_colour_and_effects_are_ordered() {
        let bg = RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 90, 255]));
        let mut layers = LayerStore::new();
        let plain = render(&bg, &mut layers, PostEffects::default());
        let cine = render(&bg, &mut layers, PostEffects { cinematic: true, deep_fry: false });
        assert_ne!(plain, cine);

        let both = render(&bg, &mut layers, PostEffects { cinematic: true, deep_fry: true });
        let fry = DeepFry { seed: 11, ..DeepFry::default() };
        let expected = filters::deep_fry(&filters::saturation_contrast(&bg, 1.15, 1.05), &fry);
        assert_eq!(both, expected);
    }
}
