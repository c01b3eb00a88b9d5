// ============================================================================
// Error types shared across the editor core
// ============================================================================

use std::time::Duration;

use thiserror::Error;

/// Why a selection gesture produced no region.
///
/// Never surfaced as a failure: `Project` turns it into a soft notice and
/// leaves every piece of state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionRejected {
    #[error("seed ({x}, {y}) lies outside the {width}×{height} texture")]
    SeedOutOfBounds { x: u32, y: u32, width: u32, height: u32 },
    #[error("seed pixel is transparent (alpha {alpha} < {min})")]
    TransparentSeed { alpha: u8, min: u8 },
    #[error("matched region {width}×{height} is smaller than {min}×{min}")]
    RegionTooSmall { width: u32, height: u32, min: u32 },
    #[error("rectangle {width}×{height} is smaller than {min}×{min}")]
    RectangleTooSmall { width: u32, height: u32, min: u32 },
}

/// Failures of the inpainting round trip. Every variant leaves the buffer,
/// the history and the selection exactly as they were before the request.
#[derive(Debug, Error)]
pub enum InpaintError {
    #[error("inpainting timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("could not reach the inpainting service: {0}")]
    Network(String),
    #[error("inpainting service rejected the request ({status}): {message}")]
    Service { status: u16, message: String },
    #[error("could not decode the inpainted image: {0}")]
    Decode(String),
    #[error("an inpainting request is already in progress")]
    Concurrent,
    #[error("nothing is selected to inpaint")]
    EmptySelection,
    #[error("inpainting was cancelled")]
    Cancelled,
}

impl From<ImageIoError> for InpaintError {
    fn from(e: ImageIoError) -> Self {
        InpaintError::Decode(e.to_string())
    }
}

/// Image decode/encode and file errors.
#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid data URL: {0}")]
    DataUrl(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors reported by a [`crate::rig::RigAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RigError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("unknown part '{0}'")]
    UnknownPart(String),
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("texture rejected: {0}")]
    TextureRejected(String),
}

/// Export failures: either the encode step or the rig itself.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Encode(#[from] ImageIoError),
    #[error(transparent)]
    Rig(#[from] RigError),
}
