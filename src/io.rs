use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::crop::CropRect;

/// Output formats picked from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
}

impl SaveFormat {
    /// Format for `path`; anything unrecognised is written as PNG.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => SaveFormat::Jpeg,
            "bmp" => SaveFormat::Bmp,
            _ => SaveFormat::Png,
        }
    }
}

/// Copy a collaborator's pixel buffer into an `RgbaImage`.
///
/// `channels` is 3 (RGB, opaque) or 4 (RGBA); `stride` is the byte length of
/// one row including any padding.
pub fn image_from_raw(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u32,
    stride: usize,
) -> Result<RgbaImage, String> {
    if channels != 3 && channels != 4 {
        return Err(format!("unsupported channel count {}", channels));
    }
    let row_len = width as usize * channels as usize;
    if stride < row_len {
        return Err(format!("row stride {} shorter than {} bytes per row", stride, row_len));
    }
    if height > 0 {
        let needed = stride * (height as usize - 1) + row_len;
        if pixels.len() < needed {
            return Err(format!("buffer holds {} bytes, {} needed", pixels.len(), needed));
        }
    }

    let n = channels as usize;
    let mut out = RgbaImage::new(width, height);
    for (y, row) in out.rows_mut().enumerate() {
        let src = &pixels[y * stride..y * stride + row_len];
        for (dst, px) in row.zip(src.chunks_exact(n)) {
            dst.0 = [px[0], px[1], px[2], if n == 4 { px[3] } else { 255 }];
        }
    }
    Ok(out)
}

/// Decode any supported image file to RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage, String> {
    let img = image::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(img.to_rgba8())
}

/// The part of `image` inside a normalized crop rectangle.
pub fn crop_image(image: &RgbaImage, crop: &CropRect) -> RgbaImage {
    if crop.is_full() {
        return image.clone();
    }
    let (x, y, w, h) = crop.to_pixels(image.width(), image.height());
    image::imageops::crop_imm(image, x, y, w, h).to_image()
}

/// Encode and write an image, choosing the format from the extension.
pub fn export_image(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match SaveFormat::from_path(path) {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
        }
        SaveFormat::Jpeg => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, 92);
            encoder.encode(rgb_image.as_raw(), rgb_image.width(), rgb_image.height(), image::ColorType::Rgb8)?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
        }
    }
    log_info!("Exported {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}

/// Write `image` as PNG regardless of the extension.
pub fn export_png(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let encoder = PngEncoder::new(&mut writer);
    #[allow(deprecated)]
    encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
    Ok(())
}
