// Certificate PDF generation
// Uses genpdf - requires Liberation, DejaVu or Arial in standard paths or FONT_DIR
use genpdf::elements::Image;
use genpdf::fonts::{FontData, FontFamily};
use genpdf::render::Area;
use genpdf::style::{Color, Style};
use genpdf::{Context, Element, Mm, Position, RenderResult, Size};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::layout::{cover_crop, pt_to_mm, PageLayout, TextPlacement};

const FONT_PATHS: [&str; 7] = [
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/dejavu-sans-fonts",
    "/usr/share/fonts/TTF",
    "/System/Library/Fonts/Supplemental",
    "/Library/Fonts",
];

/// File names of one family as distributions ship them.
struct FontFiles {
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

const FONT_FAMILIES: [FontFiles; 3] = [
    FontFiles {
        regular: "LiberationSans-Regular.ttf",
        bold: "LiberationSans-Bold.ttf",
        italic: "LiberationSans-Italic.ttf",
        bold_italic: "LiberationSans-BoldItalic.ttf",
    },
    FontFiles {
        regular: "DejaVuSans.ttf",
        bold: "DejaVuSans-Bold.ttf",
        italic: "DejaVuSans-Oblique.ttf",
        bold_italic: "DejaVuSans-BoldOblique.ttf",
    },
    FontFiles {
        regular: "Arial.ttf",
        bold: "Arial Bold.ttf",
        italic: "Arial Italic.ttf",
        bold_italic: "Arial Bold Italic.ttf",
    },
];

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("No suitable fonts found. Install fonts-liberation or fonts-dejavu, or set FONT_DIR")]
    NoFont,

    #[error("Could not read the background image: {0}")]
    Background(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF rendering failed: {0}")]
    Render(#[from] genpdf::error::Error),
}

/// Load the first usable font family, checking `extra_dir` first.
pub fn load_font_family(extra_dir: Option<&Path>) -> Result<FontFamily<FontData>, PdfError> {
    let dirs: Vec<PathBuf> = extra_dir
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FONT_PATHS.iter().map(PathBuf::from))
        .filter(|p| p.is_dir())
        .collect();

    dirs.iter()
        .find_map(|dir| {
            FONT_FAMILIES
                .iter()
                .find_map(|files| load_family(dir, files))
        })
        .ok_or(PdfError::NoFont)
}

/// Needs the regular face; missing styles fall back to it.
fn load_family(dir: &Path, files: &FontFiles) -> Option<FontFamily<FontData>> {
    let load = |name: &str| -> Option<FontData> {
        let data = std::fs::read(dir.join(name)).ok()?;
        FontData::new(data, None).ok()
    };
    let regular = load(files.regular)?;
    tracing::debug!(dir = %dir.display(), font = files.regular, "Using font family");
    Some(FontFamily {
        bold: load(files.bold).unwrap_or_else(|| regular.clone()),
        italic: load(files.italic).unwrap_or_else(|| regular.clone()),
        bold_italic: load(files.bold_italic).unwrap_or_else(|| regular.clone()),
        regular,
    })
}

/// Crop the background to the page aspect and flatten it onto white.
///
/// genpdf embeds images without an alpha channel.
pub fn prepare_background(bytes: &[u8], layout: &PageLayout) -> Result<RgbImage, PdfError> {
    let decoded = image::load_from_memory(bytes)?;
    let crop = cover_crop(decoded.width(), decoded.height(), layout.page);
    let cropped = decoded.crop_imm(crop.x, crop.y, crop.width, crop.height);
    Ok(flatten(&cropped))
}

fn flatten(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Top-left corner of a placement's text, in page millimetres.
fn text_position(placement: &TextPlacement, page: Size, text_width: Mm) -> Position {
    let x = placement
        .anchor
        .map_units(pt_to_mm)
        .origin_x(page.width, text_width);
    Position::new(x, Mm::from(pt_to_mm(placement.top)))
}

/// The whole certificate as one element: background at the page origin,
/// then every placement at its resolved position.
struct CertificatePage {
    page: Size,
    background: Option<Image>,
    placements: Vec<TextPlacement>,
}

impl Element for CertificatePage {
    fn render(
        &mut self,
        context: &Context,
        area: Area<'_>,
        style: Style,
    ) -> Result<RenderResult, genpdf::error::Error> {
        if let Some(background) = self.background.as_mut() {
            background.render(context, area.clone(), style)?;
        }

        for placement in &self.placements {
            if placement.text.is_empty() {
                continue;
            }
            let (r, g, b) = placement.color.rgb();
            let text_style = style
                .with_font_size(placement.font_size as u8)
                .with_color(Color::Rgb(r, g, b));
            let text_width = text_style.str_width(&context.font_cache, &placement.text);
            let position = text_position(placement, self.page, text_width);

            let printed =
                area.print_str(&context.font_cache, position, text_style, &placement.text)?;
            if !printed {
                tracing::warn!(
                    label = %placement.label,
                    top = placement.top,
                    "Text does not fit on the page, skipped"
                );
            }
        }

        Ok(RenderResult {
            size: self.page,
            has_more: false,
        })
    }
}

/// Encode a laid-out certificate as PDF bytes.
///
/// Blocking; run it on a blocking thread from async code.
pub fn render_certificate(
    layout: &PageLayout,
    background: Option<&[u8]>,
    font_dir: Option<&Path>,
) -> Result<Vec<u8>, PdfError> {
    let font_family = load_font_family(font_dir)?;
    let page = Size::new(pt_to_mm(layout.page.width), pt_to_mm(layout.page.height));

    // The temp file must outlive the render.
    let (background_image, _background_file) = match background {
        Some(bytes) => {
            let prepared = prepare_background(bytes, layout)?;
            let file: NamedTempFile = tempfile::Builder::new().suffix(".png").tempfile()?;
            prepared.save_with_format(file.path(), image::ImageFormat::Png)?;
            // Scale the prepared pixels to exactly the page width.
            let dpi = prepared.width() as f64 * 25.4 / pt_to_mm(layout.page.width);
            let image = Image::from_path(file.path())?
                .with_position(Position::new(0, 0))
                .with_dpi(dpi);
            (Some(image), Some(file))
        }
        None => (None, None),
    };

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title("Certificate");
    doc.set_paper_size(page);
    doc.push(CertificatePage {
        page,
        background: background_image,
        placements: layout.placements.clone(),
    });

    let mut bytes = Vec::new();
    doc.render(&mut bytes)?;

    tracing::debug!(
        size = bytes.len(),
        placements = layout.placements.len(),
        "Certificate rendered"
    );
    Ok(bytes)
}
