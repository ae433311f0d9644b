//! # Page Layout
//!
//! The page description a certificate is encoded from: a fixed A4 landscape
//! page, a cover-fit background, and one text placement per visible field.
//!
//! Everything here is in PDF points with the origin at the top-left corner.
//! Field coordinates are taken as points as-is, so a field captured at
//! natural pixel `(x, y)` lands at `(x pt, y pt)` on the page.

use std::ops::{Add, Div, Sub};

use crate::schema::{Alignment, Field, FieldValues, HexColor};

pub const POINTS_PER_MM: f64 = 72.0 / 25.4;

pub fn pt_to_mm(pt: f64) -> f64 {
    pt / POINTS_PER_MM
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// 297 x 210 mm.
pub const A4_LANDSCAPE: PageSize = PageSize {
    width: 841.89,
    height: 595.28,
};

impl PageSize {
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// Where a line of text starts horizontally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HorizontalAnchor {
    /// Centered across the full page width.
    PageCenter,
    /// Anchored at `x`, aligned inside `width` when one is set.
    Box {
        x: f64,
        width: Option<f64>,
        align: Alignment,
    },
}

impl HorizontalAnchor {
    pub fn for_field(field: &Field) -> Self {
        if field.is_center_x {
            HorizontalAnchor::PageCenter
        } else {
            HorizontalAnchor::Box {
                x: field.x,
                width: field.width,
                align: field.alignment,
            }
        }
    }

    /// Same anchor with its lengths converted by `f`.
    pub fn map_units(self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            HorizontalAnchor::PageCenter => HorizontalAnchor::PageCenter,
            HorizontalAnchor::Box { x, width, align } => HorizontalAnchor::Box {
                x: f(x),
                width: width.map(&f),
                align,
            },
        }
    }

    /// Left edge of a text `text_width` wide.
    ///
    /// Generic over the length type so a writer can resolve it in whatever
    /// unit it measures text in; the anchor's own lengths must already be in
    /// that unit.
    pub fn origin_x<L>(&self, page_width: L, text_width: L) -> L
    where
        L: Copy + From<f64> + Add<Output = L> + Sub<Output = L> + Div<f64, Output = L>,
    {
        match *self {
            HorizontalAnchor::PageCenter => (page_width - text_width) / 2.0,
            HorizontalAnchor::Box { x, width: None, .. } => L::from(x),
            HorizontalAnchor::Box {
                x,
                width: Some(width),
                align,
            } => {
                let x = L::from(x);
                let width = L::from(width);
                match align {
                    Alignment::Left => x,
                    Alignment::Center => x + (width - text_width) / 2.0,
                    Alignment::Right => x + width - text_width,
                }
            }
        }
    }
}

/// One line of text to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub label: String,
    pub text: String,
    /// Top of the text line.
    pub top: f64,
    pub font_size: u32,
    pub color: HexColor,
    pub anchor: HorizontalAnchor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub page: PageSize,
    pub background_url: String,
    /// Paint order; later placements cover earlier ones.
    pub placements: Vec<TextPlacement>,
}

impl PageLayout {
    pub fn placement(&self, label: &str) -> Option<&TextPlacement> {
        self.placements.iter().find(|p| p.label == label)
    }
}

/// Lay out a certificate. Hidden fields are skipped; a field without a
/// submitted value paints an empty string.
pub fn lay_out(background_url: &str, fields: &[Field], values: &FieldValues) -> PageLayout {
    let placements = fields
        .iter()
        .filter(|f| f.is_visible)
        .map(|field| TextPlacement {
            label: field.label.clone(),
            text: values.get(&field.label).cloned().unwrap_or_default(),
            top: field.y,
            font_size: field.font_size,
            color: field.color.clone(),
            anchor: HorizontalAnchor::for_field(field),
        })
        .collect();

    PageLayout {
        page: A4_LANDSCAPE,
        background_url: background_url.to_string(),
        placements,
    }
}

/// Pixel rectangle of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest centered crop of a `width` x `height` image with the page's
/// aspect ratio. Scaling it to the page then covers it without distortion.
pub fn cover_crop(width: u32, height: u32, page: PageSize) -> CropRect {
    if width == 0 || height == 0 {
        return CropRect {
            x: 0,
            y: 0,
            width,
            height,
        };
    }
    let target = page.aspect();
    let image = width as f64 / height as f64;
    if image > target {
        let crop_w = ((height as f64 * target).round() as u32).clamp(1, width);
        CropRect {
            x: (width - crop_w) / 2,
            y: 0,
            width: crop_w,
            height,
        }
    } else {
        let crop_h = ((width as f64 / target).round() as u32).clamp(1, height);
        CropRect {
            x: 0,
            y: (height - crop_h) / 2,
            width,
            height: crop_h,
        }
    }
}
