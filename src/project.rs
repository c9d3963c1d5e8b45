use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use crate::canvas::BlendMode;
use crate::compositor::PostEffects;
use crate::crop::CropRect;
use crate::layers::{Caption, Captions, Layer, LayerContent, LayerStore};

/// Everything that makes up one meme: base picture, layer stack, captions,
/// crop and effect toggles.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub background: Option<Arc<RgbaImage>>,
    pub layers: LayerStore,
    pub captions: Captions,
    pub crop: CropRect,
    pub effects: PostEffects,
}

impl Document {
    pub fn background_size(&self) -> Option<(u32, u32)> {
        self.background.as_ref().map(|bg| bg.dimensions())
    }
}

// ============================================================================
// PROJECT FILE FORMAT
// ============================================================================

const PROJECT_MAGIC_V1: &str = "MEM1";

/// Maximum supported image dimension in pixels (per axis).
const MAX_IMAGE_DIM: u32 = 32_768;
const MAX_LAYERS: usize = 1024;

#[derive(Serialize, Deserialize)]
struct ProjectFileV1 {
    magic: String,
    background: ImageData,
    /// Distinct overlay buffers; layers that shared a buffer share it again on load.
    images: Vec<ImageData>,
    layers: Vec<LayerData>,
    captions: [CaptionData; 2],
    crop: CropRect,
    effects: PostEffects,
}

#[derive(Serialize, Deserialize)]
struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
enum LayerKind {
    Image { image: usize },
    Text { text: String, font_size: f32 },
}

#[derive(Serialize, Deserialize)]
struct LayerData {
    kind: LayerKind,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    scale: f32,
    rotation: f32,
    opacity: f32,
    blend_mode: BlendMode,
}

#[derive(Serialize, Deserialize)]
struct CaptionData {
    text: String,
    font_size: f32,
    x: f32,
    y: f32,
}

/// Error type for project file operations
#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
    /// Only documents with a base picture can be saved.
    NoBackground,
}

impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectError::Io(e) => write!(f, "I/O error: {}", e),
            ProjectError::Serialize(e) => write!(f, "Serialization error: {}", e),
            ProjectError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
            ProjectError::NoBackground => write!(f, "Document has no base image"),
        }
    }
}

impl std::error::Error for ProjectError {}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        ProjectError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for ProjectError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        ProjectError::Serialize(e.to_string())
    }
}

impl ImageData {
    fn from_image(img: &RgbaImage) -> Self {
        Self { width: img.width(), height: img.height(), pixels: img.as_raw().clone() }
    }

    fn into_image(self, what: &str) -> Result<RgbaImage, ProjectError> {
        if self.width == 0 || self.height == 0 || self.width > MAX_IMAGE_DIM || self.height > MAX_IMAGE_DIM {
            return Err(ProjectError::InvalidFormat(format!(
                "{} has invalid dimensions {}x{}",
                what, self.width, self.height
            )));
        }
        let (w, h) = (self.width, self.height);
        RgbaImage::from_raw(w, h, self.pixels)
            .ok_or_else(|| ProjectError::InvalidFormat(format!("{} pixel data does not match {}x{}", what, w, h)))
    }
}

impl CaptionData {
    fn from_caption(c: &Caption) -> Self {
        Self { text: c.text.clone(), font_size: c.font_size, x: c.x, y: c.y }
    }

    fn into_caption(self) -> Result<Caption, ProjectError> {
        let (lo, hi) = Caption::Y_RANGE;
        Ok(Caption {
            font_size: finite(self.font_size, "caption font size")?.max(1.0),
            x: finite(self.x, "caption position")?.clamp(0.0, 1.0),
            y: finite(self.y, "caption position")?.clamp(lo, hi),
            text: self.text,
        })
    }
}

fn finite(value: f32, what: &str) -> Result<f32, ProjectError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProjectError::InvalidFormat(format!("{} is not a finite number", what)))
    }
}

impl LayerData {
    /// Rebuild a layer, clamping ranged fields and rejecting values no
    /// editor could have produced.
    fn into_layer(self, images: &[Arc<RgbaImage>]) -> Result<Layer, ProjectError> {
        let content = match self.kind {
            LayerKind::Image { image } => {
                let pixels = images
                    .get(image)
                    .ok_or_else(|| ProjectError::InvalidFormat(format!("Layer refers to missing image {}", image)))?;
                LayerContent::Image(Arc::clone(pixels))
            }
            LayerKind::Text { text, font_size } => {
                LayerContent::Text { text, font_size: finite(font_size, "font size")?.max(1.0) }
            }
        };
        let scale = finite(self.scale, "layer scale")?;
        if scale <= 0.0 {
            return Err(ProjectError::InvalidFormat(format!("Layer scale {} is not positive", scale)));
        }
        Ok(Layer {
            content,
            x: finite(self.x, "layer position")?.clamp(0.0, 1.0),
            y: finite(self.y, "layer position")?.clamp(0.0, 1.0),
            width: finite(self.width, "layer width")?.max(0.0),
            height: finite(self.height, "layer height")?.max(0.0),
            scale,
            rotation: finite(self.rotation, "layer rotation")?,
            opacity: finite(self.opacity, "layer opacity")?.clamp(0.0, 1.0),
            blend_mode: self.blend_mode,
        })
    }
}

/// Build the serializable project from a document.
fn build_project_v1(doc: &Document) -> Result<ProjectFileV1, ProjectError> {
    let background = doc.background.as_ref().ok_or(ProjectError::NoBackground)?;

    // Buffers are keyed by address so shared layers are written once.
    let mut image_index: HashMap<*const RgbaImage, usize> = HashMap::new();
    let mut images = Vec::new();
    let mut layers = Vec::with_capacity(doc.layers.len());
    for layer in doc.layers.iter() {
        let kind = match &layer.content {
            LayerContent::Image(pixels) => {
                let key = Arc::as_ptr(pixels);
                let image = *image_index.entry(key).or_insert_with(|| {
                    images.push(ImageData::from_image(pixels));
                    images.len() - 1
                });
                LayerKind::Image { image }
            }
            LayerContent::Text { text, font_size } => LayerKind::Text { text: text.clone(), font_size: *font_size },
        };
        layers.push(LayerData {
            kind,
            x: layer.x,
            y: layer.y,
            width: layer.width,
            height: layer.height,
            scale: layer.scale,
            rotation: layer.rotation,
            opacity: layer.opacity,
            blend_mode: layer.blend_mode,
        });
    }

    Ok(ProjectFileV1 {
        magic: PROJECT_MAGIC_V1.to_string(),
        background: ImageData::from_image(background),
        images,
        layers,
        captions: [CaptionData::from_caption(&doc.captions.top), CaptionData::from_caption(&doc.captions.bottom)],
        crop: doc.crop,
        effects: doc.effects,
    })
}

/// Save a document as a project file.
pub fn save_project(doc: &Document, path: &Path) -> Result<(), ProjectError> {
    let project = build_project_v1(doc)?;
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &project)?;
    log_info!(
        "Saved project {} ({} layers, {} images)",
        path.display(),
        project.layers.len(),
        project.images.len()
    );
    Ok(())
}

/// Load a project file written by [`save_project`].
pub fn load_project(path: &Path) -> Result<Document, ProjectError> {
    let raw = std::fs::read(path)?;
    if raw.len() < 12 {
        return Err(ProjectError::InvalidFormat("File too small".into()));
    }

    // bincode encodes a String as: 8-byte length prefix + UTF-8 data.
    // Our magic strings are 4 chars, so bytes 8..12 hold the magic.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    match magic {
        PROJECT_MAGIC_V1 => load_project_v1(&raw),
        _ => Err(ProjectError::InvalidFormat(format!("Unknown magic '{}'", magic))),
    }
}

fn load_project_v1(raw: &[u8]) -> Result<Document, ProjectError> {
    let project: ProjectFileV1 = bincode::deserialize(raw)?;

    if project.layers.len() > MAX_LAYERS {
        return Err(ProjectError::InvalidFormat(format!(
            "Too many layers ({}, max {})",
            project.layers.len(),
            MAX_LAYERS
        )));
    }

    let background = Arc::new(project.background.into_image("background")?);
    let images = project
        .images
        .into_iter()
        .enumerate()
        .map(|(i, data)| data.into_image(&format!("image {}", i)).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    let mut layers = LayerStore::new();
    for data in project.layers {
        layers.append(data.into_layer(&images)?);
    }

    let [top, bottom] = project.captions;
    let crop = project.crop;
    for v in [crop.x, crop.y, crop.width, crop.height] {
        finite(v, "crop rectangle")?;
    }
    Ok(Document {
        background: Some(background),
        layers,
        captions: Captions { top: top.into_caption()?, bottom: bottom.into_caption()? },
        crop: CropRect::new(crop.x, crop.y, crop.width, crop.height),
        effects: project.effects,
    })
}
