use std::sync::Arc;

use image::RgbaImage;

use crate::canvas::BlendMode;
use crate::hit_test::CaptionSlot;

/// What a layer draws.
#[derive(Clone, Debug)]
pub enum LayerContent {
    /// Decoded overlay image, shared between copies of the layer.
    Image(Arc<RgbaImage>),
    /// A line of outlined text rendered at `font_size` pixels.
    Text { text: String, font_size: f32 },
}

/// One positioned element of the compositing stack.
///
/// `x`/`y` are the normalized centre of the layer.  `width`/`height` are the
/// intrinsic size in pixels: the buffer dimensions for images, and for text
/// the measured extent cached by the compositor on every render.
#[derive(Clone, Debug)]
pub struct Layer {
    pub content: LayerContent,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub rotation: f32,
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

impl Layer {
    /// Image layer centred on the canvas at 100% scale.
    pub fn image(pixels: Arc<RgbaImage>) -> Self {
        let (w, h) = (pixels.width() as f32, pixels.height() as f32);
        Self {
            content: LayerContent::Image(pixels),
            x: 0.5,
            y: 0.5,
            width: w,
            height: h,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
        }
    }

    /// Text layer centred on the canvas.  Its size is unknown until the first render.
    pub fn text(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            content: LayerContent::Text { text: text.into(), font_size: font_size.max(1.0) },
            x: 0.5,
            y: 0.5,
            width: 0.0,
            height: 0.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
        }
    }

    /// Non-finite coordinates are ignored.
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        if x.is_finite() && y.is_finite() {
            self.x = x.clamp(0.0, 1.0);
            self.y = y.clamp(0.0, 1.0);
        }
        self
    }

    /// Only finite, positive scales are taken.
    pub fn with_scale(mut self, scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.scale = scale;
        }
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        if radians.is_finite() {
            self.rotation = radians;
        }
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        if opacity.is_finite() {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn is_text(&self) -> bool {
        matches!(self.content, LayerContent::Text { .. })
    }

    /// Size on the output image after scaling.
    pub fn scaled_size(&self) -> (f32, f32) {
        (self.width * self.scale, self.height * self.scale)
    }
}

/// Freestanding top or bottom caption.  Captions have no layer entry; they
/// are drawn after every layer and dragged by a proximity test on `y`.
#[derive(Clone, Debug, PartialEq)]
pub struct Caption {
    pub text: String,
    pub font_size: f32,
    pub x: f32,
    pub y: f32,
}

impl Caption {
    pub const DEFAULT_FONT_SIZE: f32 = 48.0;
    /// Rows a caption may sit on.
    pub const Y_RANGE: (f32, f32) = (0.05, 0.95);

    pub fn top() -> Self {
        Self { text: String::new(), font_size: Self::DEFAULT_FONT_SIZE, x: 0.5, y: 0.1 }
    }

    pub fn bottom() -> Self {
        Self { text: String::new(), font_size: Self::DEFAULT_FONT_SIZE, x: 0.5, y: 0.9 }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The top and bottom caption of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct Captions {
    pub top: Caption,
    pub bottom: Caption,
}

impl Default for Captions {
    fn default() -> Self {
        Self { top: Caption::top(), bottom: Caption::bottom() }
    }
}

impl Captions {
    pub fn get(&self, slot: CaptionSlot) -> &Caption {
        match slot {
            CaptionSlot::Top => &self.top,
            CaptionSlot::Bottom => &self.bottom,
        }
    }

    pub fn get_mut(&mut self, slot: CaptionSlot) -> &mut Caption {
        match slot {
            CaptionSlot::Top => &mut self.top,
            CaptionSlot::Bottom => &mut self.bottom,
        }
    }

    /// Put both captions back at their default rows, keeping text and size.
    pub fn reset_positions(&mut self) {
        let (top, bottom) = (Caption::top(), Caption::bottom());
        (self.top.x, self.top.y) = (top.x, top.y);
        (self.bottom.x, self.bottom.y) = (bottom.x, bottom.y);
    }

    /// Captions in paint order.
    pub fn iter(&self) -> impl Iterator<Item = &Caption> {
        [&self.top, &self.bottom].into_iter()
    }
}

/// Ordered layer list.  Index 0 is painted first (back-most).
///
/// Cloning the store is the deep copy of the layer records: every image
/// buffer gains one more `Arc` reference instead of being duplicated, and
/// text strings are copied.
#[derive(Clone, Debug, Default)]
pub struct LayerStore {
    layers: Vec<Layer>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the front of the paint order.  Returns the new layer's index.
    pub fn append(&mut self, layer: Layer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// Drop every layer, releasing their references to shared image buffers.
    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn copy(&self) -> LayerStore {
        self.clone()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<Layer> {
        (index < self.layers.len()).then(|| self.layers.remove(index))
    }

    /// Move a layer one step towards the front.  Returns its new index.
    pub fn move_up(&mut self, index: usize) -> usize {
        if index + 1 < self.layers.len() {
            self.layers.swap(index, index + 1);
            index + 1
        } else {
            index
        }
    }

    /// Move a layer one step towards the back.  Returns its new index.
    pub fn move_down(&mut self, index: usize) -> usize {
        if index > 0 && index < self.layers.len() {
            self.layers.swap(index, index - 1);
            index - 1
        } else {
            index
        }
    }

    /// Paint order, back to front.
    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Layer> {
        self.layers.iter_mut()
    }

    /// Number of live references to the image buffer of layer `index`.
    pub fn shared_count(&self, index: usize) -> Option<usize> {
        match &self.layers.get(index)?.content {
            LayerContent::Image(pixels) => Some(Arc::strong_count(pixels)),
            LayerContent::Text { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn red_square() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn copy_shares_pixels_and_duplicates_records() {
        let mut store = LayerStore::new();
        store.append(Layer::image(red_square()));
        store.append(Layer::text("hello", 32.0));

        let mut copy = store.copy();
        assert_eq!(store.shared_count(0), Some(2));

        copy.get_mut(0).unwrap().x = 0.9;
        if let Some(Layer { content: LayerContent::Text { text, .. }, .. }) = copy.get_mut(1) {
            text.push_str(" world");
        }
        assert_eq!(store.get(0).unwrap().x, 0.5);
        match &store.get(1).unwrap().content {
            LayerContent::Text { text, .. } => assert_eq!(text, "hello"),
            LayerContent::Image(_) => panic!("expected text layer"),
        }

        drop(copy);
        assert_eq!(store.shared_count(0), Some(1));
    }

    #[test]
    fn clear_releases_shared_buffers() {
        let pixels = red_square();
        let mut store = LayerStore::new();
        store.append(Layer::image(Arc::clone(&pixels)));
        store.append(Layer::image(Arc::clone(&pixels)));
        assert_eq!(Arc::strong_count(&pixels), 3);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(Arc::strong_count(&pixels), 1);
    }

    #[test]
    fn append_paints_in_front_and_reorder_moves_one_step() {
        let mut store = LayerStore::new();
        let a = store.append(Layer::text("a", 10.0));
        let b = store.append(Layer::text("b", 10.0));
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.move_down(1), 0);
        assert_eq!(store.move_down(0), 0);
        assert_eq!(store.move_up(0), 1);
        assert_eq!(store.move_up(1), 1);
        assert!(store.remove(5).is_none());
        assert!(store.remove(0).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn new_image_layer_uses_buffer_size() {
        let layer = Layer::image(red_square()).with_scale(2.0);
        assert_eq!(layer.scaled_size(), (8.0, 8.0));
        assert!(!layer.is_text());
    }

    #[test]
    fn builders_ignore_non_finite_and_degenerate_values() {
        let layer = Layer::image(red_square())
            .with_position(f32::NAN, 0.2)
            .with_scale(0.0)
            .with_rotation(f32::INFINITY)
            .with_opacity(f32::NAN);
        assert_eq!((layer.x, layer.y), (0.5, 0.5));
        assert_eq!(layer.scale, 1.0);
        assert_eq!(layer.rotation, 0.0);
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(Layer::image(red_square()).with_scale(f32::NAN).scale, 1.0);
    }
}
