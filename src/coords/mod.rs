//! # Coordinate Mapper
//!
//! The editor shows the background scaled to fit the viewport, but field
//! positions are stored in the image's natural pixel space. This module
//! converts between the two.
//!
//! ```text
//! natural_x = (pointer_x - rect.left) * natural.width  / rect.width
//! natural_y = (pointer_y - rect.top)  * natural.height / rect.height
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// The preview has no measured size yet (image still loading).
    #[error("Rendered image is not measured yet ({width}x{height})")]
    Unmeasured { width: f64, height: f64 },

    #[error("Invalid natural image size {width}x{height}")]
    InvalidNaturalSize { width: f64, height: f64 },

    #[error("Coordinates must be finite numbers")]
    NonFinite,
}

/// Pointer position in viewport space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Position in the background's natural pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaturalPoint {
    pub x: f64,
    pub y: f64,
}

/// Bounding box of the rendered image element (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderedRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Original, unscaled dimensions of the background asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaturalSize {
    pub width: f64,
    pub height: f64,
}

/// A validated pairing of a rendered image box and its natural size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageMapping {
    rect: RenderedRect,
    natural: NaturalSize,
}

impl ImageMapping {
    pub fn new(rect: RenderedRect, natural: NaturalSize) -> Result<Self, MappingError> {
        let all = [rect.left, rect.top, rect.width, rect.height, natural.width, natural.height];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(MappingError::NonFinite);
        }
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(MappingError::Unmeasured {
                width: rect.width,
                height: rect.height,
            });
        }
        if natural.width <= 0.0 || natural.height <= 0.0 {
            return Err(MappingError::InvalidNaturalSize {
                width: natural.width,
                height: natural.height,
            });
        }
        Ok(Self { rect, natural })
    }

    /// Natural pixels per rendered pixel, horizontally and vertically.
    pub fn scale(&self) -> (f64, f64) {
        (
            self.natural.width / self.rect.width,
            self.natural.height / self.rect.height,
        )
    }

    pub fn to_natural(&self, pointer: ScreenPoint) -> Result<NaturalPoint, MappingError> {
        if !pointer.x.is_finite() || !pointer.y.is_finite() {
            return Err(MappingError::NonFinite);
        }
        let (sx, sy) = self.scale();
        Ok(NaturalPoint {
            x: (pointer.x - self.rect.left) * sx,
            y: (pointer.y - self.rect.top) * sy,
        })
    }

    /// Inverse of [`to_natural`](Self::to_natural), used to draw markers on
    /// the scaled preview.
    pub fn to_screen(&self, point: NaturalPoint) -> Result<ScreenPoint, MappingError> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(MappingError::NonFinite);
        }
        let (sx, sy) = self.scale();
        Ok(ScreenPoint {
            x: point.x / sx + self.rect.left,
            y: point.y / sy + self.rect.top,
        })
    }
}

/// Map a pointer event on the rendered preview to natural pixel space.
pub fn map_pointer(
    pointer: ScreenPoint,
    rect: RenderedRect,
    natural: NaturalSize,
) -> Result<NaturalPoint, MappingError> {
    ImageMapping::new(rect, natural)?.to_natural(pointer)
}
