//! Coordinate mapping from normalized anomaly geometry to pixel space.
//!
//! The reasoning service reports boxes on a fixed 0-1000 scale along both axes,
//! independent of the actual frame resolution. That scale is the contract with the
//! service and must not be altered. One canonical representation
//! (`NormalizedBox`, top-left + extent) is used everywhere inside the crate;
//! endpoint variants that return corner ordering are converted at the boundary
//! via `NormalizedBox::from_corners`.

use serde::{Deserialize, Serialize};

/// Both axes of the normalized coordinate space run 0..=1000.
pub const NORMALIZED_SCALE: f64 = 1000.0;

/// Canonical anomaly box: top-left origin plus extent, in 0-1000 space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    /// Build from a `[x, y, width, height]` slice.
    ///
    /// Returns `None` for malformed input (wrong arity, non-finite values,
    /// negative extent) rather than erroring -- a bad box degrades to "no box".
    pub fn from_xywh(values: &[f64]) -> Option<Self> {
        let [x, y, width, height] = checked_arity(values)?;
        if width < 0.0 || height < 0.0 {
            return None;
        }
        Some(Self { x, y, width, height })
    }

    /// Build from a `[ymin, xmin, ymax, xmax]` slice (corner-ordered endpoints).
    ///
    /// Returns `None` for malformed input or inverted corners.
    pub fn from_corners(values: &[f64]) -> Option<Self> {
        let [ymin, xmin, ymax, xmax] = checked_arity(values)?;
        if xmax < xmin || ymax < ymin {
            return None;
        }
        Some(Self {
            x: xmin,
            y: ymin,
            width: xmax - xmin,
            height: ymax - ymin,
        })
    }
}

/// A drawable rectangle in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Map a normalized box onto a canvas of the given pixel size.
///
/// When `mirrored` is true the horizontal position is reflected
/// (`x' = canvas_width - (x + width)` in pixel space) so the overlay stays
/// attached to the tracked object on a mirrored live feed.
pub fn map_box(
    bx: &NormalizedBox,
    canvas_width: f64,
    canvas_height: f64,
    mirrored: bool,
) -> PixelRect {
    let width = bx.width / NORMALIZED_SCALE * canvas_width;
    let height = bx.height / NORMALIZED_SCALE * canvas_height;
    let y = bx.y / NORMALIZED_SCALE * canvas_height;
    let x = if mirrored {
        canvas_width - (bx.x + bx.width) / NORMALIZED_SCALE * canvas_width
    } else {
        bx.x / NORMALIZED_SCALE * canvas_width
    };

    PixelRect { x, y, width, height }
}

/// Validate arity and finiteness of a raw box slice.
fn checked_arity(values: &[f64]) -> Option<[f64; 4]> {
    if values.len() != 4 {
        return None;
    }
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some([values[0], values[1], values[2], values[3]])
}
