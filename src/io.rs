use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageError, RgbaImage};

/// Quality used for every export (matches a browser's `toDataURL(.., 0.92)`).
pub const EXPORT_QUALITY: u8 = 92;

/// Maximum supported image dimension in pixels (per axis). Files whose
/// header claims more are refused before decoding.
pub const MAX_IMAGE_DIM: u32 = 32_768;

/// Extensions the asset listing accepts (compared lowercase).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

/// The single format every save is written in, whatever was loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportFormat {
    pub quality: u8,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self {
            quality: EXPORT_QUALITY,
        }
    }
}

impl ExportFormat {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn mime(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
        encode_export(image, self.quality)
    }
}

/// Check whether a file name carries one of the listable image extensions.
pub fn is_supported_image(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode raw file bytes into an RGBA buffer at natural resolution.
///
/// The size limit is checked against the header before any pixel is decoded.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, String> {
    if bytes.is_empty() {
        return Err("file is empty".to_string());
    }
    let (w, h) = probe_dimensions(bytes)?;
    if w == 0 || h == 0 {
        return Err("image dimensions cannot be zero".to_string());
    }
    if w > MAX_IMAGE_DIM || h > MAX_IMAGE_DIM {
        return Err(format!(
            "image size {}x{} exceeds maximum allowed {}x{}",
            w, h, MAX_IMAGE_DIM, MAX_IMAGE_DIM
        ));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| format!("decode error: {}", e))?
        .to_rgba8();
    if img.dimensions() != (w, h) {
        return Err(format!(
            "decoded {}x{} but header says {}x{}",
            img.width(),
            img.height(),
            w,
            h
        ));
    }
    Ok(img)
}

/// Width and height from the file header only.
fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("decode error: {}", e))?
        .into_dimensions()
        .map_err(|e| format!("decode error: {}", e))
}

/// Encode the working buffer as JPEG. Alpha is dropped; JPEG has none.
/// Standalone so it can run on a background thread.
pub fn encode_export(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder.encode(
            rgb_image.as_raw(),
            rgb_image.width(),
            rgb_image.height(),
            image::ColorType::Rgb8,
        )?;
    }
    Ok(out)
}
