//! Frame acquisition and preparation for vision API calls.
//!
//! Frames are downscaled to a bounded longest edge before sending to keep
//! payloads and API cost under control.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Maximum dimension (width or height) for frames sent to the service.
pub const MAX_FRAME_DIMENSION: u32 = 1024;

/// Minimum dimension for a usable analysis frame.
pub const MIN_FRAME_DIMENSION: u32 = 200;

/// Abstracts "get the current video frame as an encoded still image".
///
/// `None` means the device is not ready; callers treat it as "skip this
/// cycle", never as an error.
pub trait FrameSource {
    fn get_frame(&mut self) -> Option<Vec<u8>>;
}

/// Frame source backed by a single still image.
///
/// Used for static-reference sessions and in tests; every cycle sees the same
/// frame until `replace` swaps it.
pub struct StillFrameSource {
    frame: Option<Vec<u8>>,
}

impl StillFrameSource {
    pub fn new(frame: Vec<u8>) -> Self {
        Self { frame: Some(frame) }
    }

    /// A source with no frame available (device not ready).
    pub fn empty() -> Self {
        Self { frame: None }
    }

    pub fn replace(&mut self, frame: Vec<u8>) {
        self.frame = Some(frame);
    }
}

impl FrameSource for StillFrameSource {
    fn get_frame(&mut self) -> Option<Vec<u8>> {
        self.frame.clone()
    }
}

/// Prepare a captured frame for the vision API: decode, validate, downscale,
/// re-encode as JPEG, base64.
///
/// # Errors
/// - Frame bytes cannot be decoded as an image
/// - Frame is too small for reliable analysis (< 200px on the short side)
pub fn prepare_frame(frame_bytes: &[u8]) -> Result<String, String> {
    let img = image::load_from_memory(frame_bytes)
        .map_err(|e| format!("Failed to decode frame: {}", e))?;

    let (width, height) = (img.width(), img.height());
    if width.min(height) < MIN_FRAME_DIMENSION {
        return Err(format!(
            "Frame too small for reliable analysis: {}x{} (minimum {}px)",
            width, height, MIN_FRAME_DIMENSION
        ));
    }

    let img = downscale(img);
    debug!("Prepared frame: {}x{}", img.width(), img.height());

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| format!("Failed to encode frame as JPEG: {}", e))?;

    Ok(STANDARD.encode(buffer.into_inner()))
}

/// Media type for prepared frame payloads.
pub fn frame_media_type() -> &'static str {
    "image/jpeg"
}

/// Cap the longest edge at `MAX_FRAME_DIMENSION`, preserving aspect ratio.
fn downscale(img: DynamicImage) -> DynamicImage {
    let longest = img.width().max(img.height());
    if longest <= MAX_FRAME_DIMENSION {
        return img;
    }
    let scale = MAX_FRAME_DIMENSION as f32 / longest as f32;
    let new_width = (img.width() as f32 * scale) as u32;
    let new_height = (img.height() as f32 * scale) as u32;
    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}
