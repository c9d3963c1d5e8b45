/// On-screen widget size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Letterboxed placement of an image inside a viewport: uniform scale,
/// aspect ratio preserved, centred.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageFit {
    pub scale: f32,
    pub draw_w: f32,
    pub draw_h: f32,
    pub off_x: f32,
    pub off_y: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Fit an `image_w × image_h` image into this viewport.
    /// `None` when either side is degenerate.
    pub fn fit(&self, image_w: f32, image_h: f32) -> Option<ImageFit> {
        if self.is_empty() || !(image_w > 0.0 && image_h > 0.0) {
            return None;
        }
        let scale = (self.width / image_w).min(self.height / image_h);
        let draw_w = image_w * scale;
        let draw_h = image_h * scale;
        Some(ImageFit {
            scale,
            draw_w,
            draw_h,
            off_x: (self.width - draw_w) / 2.0,
            off_y: (self.height - draw_h) / 2.0,
        })
    }

    /// Widget pixel → normalized image coordinates.
    ///
    /// Returns `(0, 0)` when there is no image or the viewport is empty;
    /// callers must check for a loaded image before trusting the result.
    /// Points in the letterbox bands map outside `[0, 1]`.
    pub fn to_image(&self, image_size: Option<(u32, u32)>, wx: f32, wy: f32) -> (f32, f32) {
        let Some((iw, ih)) = image_size else { return (0.0, 0.0) };
        match self.fit(iw as f32, ih as f32) {
            Some(fit) => ((wx - fit.off_x) / fit.draw_w, (wy - fit.off_y) / fit.draw_h),
            None => (0.0, 0.0),
        }
    }

    /// Normalized image coordinates → widget pixel.  Inverse of [`Viewport::to_image`].
    pub fn to_widget(&self, image_size: Option<(u32, u32)>, ix: f32, iy: f32) -> (f32, f32) {
        let Some((iw, ih)) = image_size else { return (0.0, 0.0) };
        match self.fit(iw as f32, ih as f32) {
            Some(fit) => (ix * fit.draw_w + fit.off_x, iy * fit.draw_h + fit.off_y),
            None => (0.0, 0.0),
        }
    }

    /// Pointer offset in widget pixels → offset as a fraction of the viewport.
    pub fn normalize_delta(&self, dx: f32, dy: f32) -> (f32, f32) {
        if self.is_empty() {
            return (0.0, 0.0);
        }
        (dx / self.width, dy / self.height)
    }
}
