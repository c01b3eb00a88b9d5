use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use base64::{Engine, engine::general_purpose};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};

use crate::canvas::PixelBuffer;
use crate::error::ImageIoError;

/// Maximum supported texture dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted files.
const MAX_TEXTURE_DIM: u32 = 16_384;

// ============================================================================
// SYNCHRONOUS IMAGE LOADER
// ============================================================================

/// Decode any raster image the `image` crate understands into RGBA.
pub fn load_image_sync(path: &Path) -> Result<PixelBuffer, ImageIoError> {
    let img = image::open(path)?.to_rgba8();
    check_dimensions(&img)?;
    log::info!("Loaded {} ({}×{})", path.display(), img.width(), img.height());
    Ok(PixelBuffer::from_rgba_image(img))
}

pub fn load_image_bytes(bytes: &[u8]) -> Result<PixelBuffer, ImageIoError> {
    let img = decode_rgba(bytes)?;
    Ok(PixelBuffer::from_rgba_image(img))
}

fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, ImageIoError> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    check_dimensions(&img)?;
    Ok(img)
}

fn check_dimensions(img: &RgbaImage) -> Result<(), ImageIoError> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || w > MAX_TEXTURE_DIM || h > MAX_TEXTURE_DIM {
        return Err(ImageIoError::DataUrl(format!(
            "unsupported image size {w}×{h}"
        )));
    }
    Ok(())
}

// ============================================================================
// PNG / DATA URL
// ============================================================================

/// Lossless PNG encoding of an RGBA image.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageIoError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(out)
}

/// `data:image/png;base64,...` for an RGBA image.
pub fn encode_png_data_url(image: &RgbaImage) -> Result<String, ImageIoError> {
    let png = encode_png(image)?;
    let encoded = general_purpose::STANDARD.encode(png);
    Ok(format!("data:image/png;base64,{encoded}"))
}

/// Export the live texture for the host application.
pub fn export_data_url(buffer: &PixelBuffer) -> Result<String, ImageIoError> {
    encode_png_data_url(buffer.as_image())
}

/// Returns true for `data:` URLs (as opposed to `http(s)` links).
pub fn is_data_url(url: &str) -> bool {
    url.trim_start().starts_with("data:")
}

/// Decode a base64 `data:` URL holding any raster format.
pub fn decode_data_url(url: &str) -> Result<RgbaImage, ImageIoError> {
    let url = url.trim();
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ImageIoError::DataUrl("missing 'data:' scheme".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageIoError::DataUrl("missing ',' separator".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(ImageIoError::DataUrl(format!(
            "unsupported encoding '{meta}', expected base64"
        )));
    }
    let bytes = general_purpose::STANDARD.decode(payload.trim())?;
    decode_rgba(&bytes)
}

/// Decode raw response bytes (used for `http(s)` image links).
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbaImage, ImageIoError> {
    decode_rgba(bytes)
}

pub fn save_png(buffer: &PixelBuffer, path: &Path) -> Result<(), ImageIoError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer).write_image(
        buffer.as_raw(),
        buffer.width(),
        buffer.height(),
        ColorType::Rgba8,
    )?;
    Ok(())
}
