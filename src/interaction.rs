// ============================================================================
// INTERACTION: pointer drag state machine over a document
// ============================================================================
//
// A gesture is begin → update* → end.  Begin classifies the target (layer
// resize corner, layer body, crop handle, caption row) and snapshots its
// starting values into a `DragSession`.  Each update rewrites the target from
// that snapshot plus the pointer offset, clamps, and recomposites.  End drops
// the session.
// ============================================================================

use image::RgbaImage;
use std::sync::Arc;

use crate::compositor::{self, PostEffects};
use crate::crop::CropRect;
use crate::hit_test::{self, CaptionSlot, CropHandle, CursorHint, HitKind};
use crate::io;
use crate::layers::{Caption, Layer};
use crate::ops::text::FontSet;
use crate::overlay;
use crate::project::Document;
use crate::settings::EngineSettings;
use crate::viewport::Viewport;

/// In-progress drag.  Each variant keeps the pointer position at begin
/// (widget pixels) and only the starting values its target needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragSession {
    MoveLayer { index: usize, start: (f32, f32), anchor: (f32, f32) },
    ResizeLayer { index: usize, start: (f32, f32), anchor_scale: f32 },
    MoveCrop { start: (f32, f32), anchor_rect: CropRect },
    ResizeCrop { handle: CropHandle, start: (f32, f32), anchor_rect: CropRect },
    MoveCaption { which: CaptionSlot, start: (f32, f32), anchor: (f32, f32) },
}

/// Coarse state of the drag machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    DraggingImageMove,
    DraggingImageResize,
    DraggingCropMove,
    DraggingCropResize,
    DraggingFreeText,
}

impl DragSession {
    pub fn state(&self) -> DragState {
        match self {
            DragSession::MoveLayer { .. } => DragState::DraggingImageMove,
            DragSession::ResizeLayer { .. } => DragState::DraggingImageResize,
            DragSession::MoveCrop { .. } => DragState::DraggingCropMove,
            DragSession::ResizeCrop { .. } => DragState::DraggingCropResize,
            DragSession::MoveCaption { .. } => DragState::DraggingFreeText,
        }
    }

    fn start(&self) -> (f32, f32) {
        match *self {
            DragSession::MoveLayer { start, .. }
            | DragSession::ResizeLayer { start, .. }
            | DragSession::MoveCrop { start, .. }
            | DragSession::ResizeCrop { start, .. }
            | DragSession::MoveCaption { start, .. } => start,
        }
    }
}

/// Editing session: the document plus selection, viewport and cached renders.
pub struct Editor {
    pub document: Document,
    pub selected: Option<usize>,
    /// Whether the crop view is shown and crop handles take drags.
    pub crop_active: bool,
    pub viewport: Viewport,
    pub settings: EngineSettings,
    pub fonts: FontSet,
    composite: Option<RgbaImage>,
    overlay: Option<RgbaImage>,
    drag: Option<DragSession>,
}

impl Editor {
    pub fn new(settings: EngineSettings, fonts: FontSet) -> Self {
        Self {
            document: Document::default(),
            selected: None,
            crop_active: false,
            viewport: Viewport::default(),
            settings,
            fonts,
            composite: None,
            overlay: None,
            drag: None,
        }
    }

    /// Replace the whole document, e.g. after loading a project file.
    pub fn open_document(&mut self, document: Document) {
        self.document = document;
        self.selected = None;
        self.drag = None;
        self.recomposite();
    }

    /// Start over on a new base picture.  Layers are dropped and the
    /// captions return to their default rows.
    pub fn load_background(&mut self, image: Arc<RgbaImage>) {
        log_info!("Background {}x{}", image.width(), image.height());
        self.document.background = Some(image);
        self.document.layers.clear();
        self.document.captions.reset_positions();
        self.document.crop = CropRect::FULL;
        self.selected = None;
        self.drag = None;
        self.recomposite();
    }

    /// Add an overlay image in front of every layer and select it.
    pub fn add_image_layer(&mut self, pixels: Arc<RgbaImage>) -> usize {
        let index = self.document.layers.append(Layer::image(pixels));
        self.selected = Some(index);
        self.recomposite();
        index
    }

    /// Add a text layer in front of every layer and select it.
    pub fn add_text_layer(&mut self, text: &str, font_size: f32) -> usize {
        let index = self.document.layers.append(Layer::text(text, font_size));
        self.selected = Some(index);
        self.recomposite();
        index
    }

    pub fn remove_layer(&mut self, index: usize) -> Option<Layer> {
        let removed = self.document.layers.remove(index)?;
        self.drag = None;
        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        self.recomposite();
        Some(removed)
    }

    /// Move layer `index` one step towards the front.  Returns its new index.
    pub fn raise_layer(&mut self, index: usize) -> usize {
        let to = self.document.layers.move_up(index);
        self.after_reorder(index, to)
    }

    /// Move layer `index` one step towards the back.  Returns its new index.
    pub fn lower_layer(&mut self, index: usize) -> usize {
        let to = self.document.layers.move_down(index);
        self.after_reorder(index, to)
    }

    /// Keep the selection on the same layer after `from` and `to` swapped.
    fn after_reorder(&mut self, from: usize, to: usize) -> usize {
        if from != to {
            self.selected = match self.selected {
                Some(s) if s == from => Some(to),
                Some(s) if s == to => Some(from),
                other => other,
            };
            self.drag = None;
            self.recomposite();
        }
        to
    }

    /// Remove every layer and caption text.  The background stays.
    pub fn clear(&mut self) {
        self.document.layers.clear();
        self.document.captions.top.text.clear();
        self.document.captions.bottom.text.clear();
        self.document.crop = CropRect::FULL;
        self.selected = None;
        self.drag = None;
        self.recomposite();
    }

    pub fn set_caption(&mut self, slot: CaptionSlot, text: &str, font_size: f32) {
        let caption = self.document.captions.get_mut(slot);
        caption.text = text.to_string();
        caption.font_size = font_size.max(1.0);
        self.recomposite();
    }

    pub fn set_effects(&mut self, effects: PostEffects) {
        self.document.effects = effects;
        self.recomposite();
    }

    pub fn set_crop_active(&mut self, active: bool) {
        self.crop_active = active;
        self.drag = None;
        self.recomposite();
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.document.layers.get(self.selected?)
    }

    pub fn composite(&self) -> Option<&RgbaImage> {
        self.composite.as_ref()
    }

    pub fn overlay(&self) -> Option<&RgbaImage> {
        self.overlay.as_ref()
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn state(&self) -> DragState {
        self.drag.as_ref().map_or(DragState::Idle, DragSession::state)
    }

    /// Re-render the composite and the editor overlay.
    pub fn recomposite(&mut self) {
        let background = self.document.background.clone();
        self.composite = compositor::render_composite(
            background.as_deref(),
            &mut self.document.layers,
            &self.document.captions,
            self.document.effects,
            &self.fonts,
            &self.settings,
        );
        self.overlay = self.composite.as_ref().map(|composite| {
            let crop = self.crop_active.then_some(&self.document.crop);
            overlay::render_overlay(composite, self.selected_layer(), crop, &self.settings)
        });
    }

    /// The composite with the crop rectangle applied, ready for export.
    pub fn export_image(&self) -> Option<RgbaImage> {
        let composite = self.composite.as_ref()?;
        Some(io::crop_image(composite, &self.document.crop))
    }

    /// Widget pixel → normalized image point, or `None` when nothing can be hit.
    fn pointer(&self, wx: f32, wy: f32) -> Option<(f32, f32)> {
        let size = self.document.background_size()?;
        if self.viewport.is_empty() {
            return None;
        }
        Some(self.viewport.to_image(Some(size), wx, wy))
    }

    fn layer_hit(&self, x: f32, y: f32) -> Option<hit_test::LayerHit> {
        hit_test::layer_at(
            &self.document.layers,
            self.selected,
            x,
            y,
            (self.viewport.width, self.viewport.height),
            self.settings.resize_corner_radius,
        )
    }

    /// Cursor to show for a pointer hovering at widget `(wx, wy)`.
    pub fn hover(&self, wx: f32, wy: f32) -> CursorHint {
        match self.pointer(wx, wy) {
            Some((x, y)) => CursorHint::from(self.layer_hit(x, y)),
            None => CursorHint::Default,
        }
    }

    /// Start a gesture at widget `(wx, wy)`.  Returns whether something is
    /// now being dragged.
    pub fn drag_begin(&mut self, wx: f32, wy: f32) -> bool {
        self.drag = None;
        let Some((x, y)) = self.pointer(wx, wy) else {
            return false;
        };
        let start = (wx, wy);

        let session = if let Some(hit) = self.layer_hit(x, y) {
            self.selected = Some(hit.index);
            let layer = self.document.layers.get(hit.index);
            layer.map(|layer| match hit.kind {
                HitKind::Resize => DragSession::ResizeLayer { index: hit.index, start, anchor_scale: layer.scale },
                HitKind::Move => DragSession::MoveLayer { index: hit.index, start, anchor: (layer.x, layer.y) },
            })
        } else {
            self.selected = None;
            self.crop_session(x, y, start).or_else(|| self.caption_session(y, start))
        };

        self.drag = session;
        self.recomposite();
        self.drag.is_some()
    }

    fn crop_session(&self, x: f32, y: f32, start: (f32, f32)) -> Option<DragSession> {
        if !self.crop_active {
            return None;
        }
        let anchor_rect = self.document.crop;
        match hit_test::crop_handle_at(x, y, &anchor_rect, self.settings.crop_handle_radius)? {
            CropHandle::Center => Some(DragSession::MoveCrop { start, anchor_rect }),
            handle => Some(DragSession::ResizeCrop { handle, start, anchor_rect }),
        }
    }

    fn caption_session(&self, y: f32, start: (f32, f32)) -> Option<DragSession> {
        let captions = &self.document.captions;
        let which = hit_test::caption_at(y, &captions.top, &captions.bottom, self.viewport.height)?;
        let caption = captions.get(which);
        Some(DragSession::MoveCaption { which, start, anchor: (caption.x, caption.y) })
    }

    /// Pointer moved to widget `(wx, wy)` during a gesture.
    pub fn drag_update(&mut self, wx: f32, wy: f32) {
        let Some(session) = self.drag else { return };
        if self.document.background.is_none() || self.viewport.is_empty() {
            return;
        }
        let (sx, sy) = session.start();
        let (off_x, off_y) = (wx - sx, wy - sy);
        let (dx, dy) = self.viewport.normalize_delta(off_x, off_y);

        match session {
            DragSession::MoveLayer { index, anchor, .. } => {
                if let Some(layer) = self.document.layers.get_mut(index) {
                    layer.x = (anchor.0 + dx).clamp(0.0, 1.0);
                    layer.y = (anchor.1 + dy).clamp(0.0, 1.0);
                }
            }
            DragSession::ResizeLayer { index, anchor_scale, .. } => {
                let (lo, hi) = (self.settings.min_scale, self.settings.max_scale);
                let change = (off_x + off_y) / self.settings.resize_divisor;
                if let Some(layer) = self.document.layers.get_mut(index) {
                    layer.scale = (anchor_scale + change).clamp(lo, hi);
                }
            }
            DragSession::MoveCrop { anchor_rect, .. } => {
                self.document.crop = CropRect::moved(&anchor_rect, dx, dy);
            }
            DragSession::ResizeCrop { handle, anchor_rect, .. } => {
                self.document.crop = CropRect::resized(&anchor_rect, handle, dx, dy, self.settings.min_crop_size);
            }
            DragSession::MoveCaption { which, anchor, .. } => {
                let caption = self.document.captions.get_mut(which);
                caption.x = (anchor.0 + dx).clamp(0.0, 1.0);
                caption.y = (anchor.1 + dy).clamp(Caption::Y_RANGE.0, Caption::Y_RANGE.1);
            }
        }
        self.recomposite();
    }

    /// Finish the gesture.  Whatever was dragged keeps its last value.
    pub fn drag_end(&mut self) {
        self.drag = None;
    }
}
