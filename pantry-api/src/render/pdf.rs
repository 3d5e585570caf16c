//! A4 PDF renderer with an embedded TrueType font.
//!
//! Layout: a centered title row, one empty row, then one 10 mm row per
//! entry. Rows that do not fit above the bottom margin continue on a new
//! page without a title.

use std::borrow::Cow;
use std::io::Cursor;

use pantry_core::{AggregatedLine, RenderError};
use printpdf::{Mm, PdfDocument};
use tracing::debug;

use super::{RenderedDocument, ShoppingListRenderer};
use crate::config::RenderConfig;

pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

const MARGIN_MM: f32 = 10.0;
const BOTTOM_MARGIN_MM: f32 = 20.0;
const ROW_HEIGHT_MM: f32 = 10.0;
/// Baseline position inside a row, measured from the row's top edge.
const BASELINE_OFFSET_MM: f32 = 7.0;
/// Rows taken by the title and the gap beneath it.
const TITLE_ROWS: usize = 2;

const PT_TO_MM: f32 = 25.4 / 72.0;

/// DejaVu Sans, used when no font file is configured.
pub const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_FONT_NAME: &str = "<bundled DejaVu Sans>";

const CONTENT_TYPE: &str = "application/pdf";
const FILENAME: &str = "shopping_cart.pdf";

/// Text anchored at its baseline start, in PDF coordinates (origin at the
/// bottom-left corner of the page).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x_mm: f32,
    pub y_mm: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedPage {
    pub items: Vec<PlacedText>,
}

fn rows_per_page() -> usize {
    ((A4_HEIGHT_MM - MARGIN_MM - BOTTOM_MARGIN_MM) / ROW_HEIGHT_MM) as usize
}

fn baseline(row: usize) -> f32 {
    A4_HEIGHT_MM - MARGIN_MM - row as f32 * ROW_HEIGHT_MM - BASELINE_OFFSET_MM
}

/// Place the title and every numbered entry on A4 pages.
///
/// `title_width_mm` is the rendered width of `title` in the document font
/// and is only used to center it.
pub fn layout_lines(
    title: &str,
    title_width_mm: f32,
    lines: &[AggregatedLine],
) -> Vec<RenderedPage> {
    let per_page = rows_per_page();
    let mut pages = vec![RenderedPage::default()];

    let title_x = ((A4_WIDTH_MM - title_width_mm) / 2.0).max(MARGIN_MM);
    pages[0].items.push(PlacedText {
        text: title.to_string(),
        x_mm: title_x,
        y_mm: baseline(0),
    });

    let mut row = TITLE_ROWS;
    for (index, line) in lines.iter().enumerate() {
        if row >= per_page {
            pages.push(RenderedPage::default());
            row = 0;
        }
        if let Some(page) = pages.last_mut() {
            page.items.push(PlacedText {
                text: line.numbered(index + 1),
                x_mm: MARGIN_MM,
                y_mm: baseline(row),
            });
        }
        row += 1;
    }

    pages
}

/// Advance width of `text` in millimetres at `size_pt`. Characters the font
/// lacks count as zero width.
fn text_width_mm(face: &ttf_parser::Face<'_>, text: &str, size_pt: f32) -> f32 {
    let units_per_em = f32::from(face.units_per_em().max(1));
    let advance: u32 = text
        .chars()
        .filter_map(|c| face.glyph_index(c))
        .filter_map(|gid| face.glyph_hor_advance(gid))
        .map(u32::from)
        .sum();
    advance as f32 / units_per_em * size_pt * PT_TO_MM
}

/// Renders shopping lists as A4 PDFs.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    config: RenderConfig,
}

impl PdfRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn font_name(&self) -> String {
        match &self.config.font_path {
            Some(path) => path.display().to_string(),
            None => BUNDLED_FONT_NAME.to_string(),
        }
    }

    /// A configured font that cannot be read is an error, never a silent
    /// fallback to the bundled one.
    fn load_font(&self) -> Result<Cow<'static, [u8]>, RenderError> {
        match &self.config.font_path {
            Some(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| RenderError::FontUnavailable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(Cow::Borrowed(BUNDLED_FONT)),
        }
    }
}

impl ShoppingListRenderer for PdfRenderer {
    fn render(&self, lines: &[AggregatedLine]) -> Result<RenderedDocument, RenderError> {
        if lines.is_empty() {
            return Err(RenderError::EmptyInput);
        }

        let font_bytes = self.load_font()?;
        let font_unavailable = |reason: String| RenderError::FontUnavailable {
            path: self.font_name(),
            reason,
        };

        let face = ttf_parser::Face::parse(&font_bytes, 0)
            .map_err(|e| font_unavailable(e.to_string()))?;
        let title_width = text_width_mm(&face, &self.config.title, self.config.font_size);
        let pages = layout_lines(&self.config.title, title_width, lines);

        let (doc, first_page, first_layer) = PdfDocument::new(
            self.config.title.as_str(),
            Mm(A4_WIDTH_MM),
            Mm(A4_HEIGHT_MM),
            "Layer 1",
        );
        let font = doc
            .add_external_font(Cursor::new(font_bytes.as_ref()))
            .map_err(|e| font_unavailable(e.to_string()))?;

        for (index, page) in pages.iter().enumerate() {
            let (page_ref, layer_ref) = if index == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1")
            };
            let layer = doc.get_page(page_ref).get_layer(layer_ref);
            for item in &page.items {
                layer.use_text(
                    item.text.as_str(),
                    self.config.font_size,
                    Mm(item.x_mm),
                    Mm(item.y_mm),
                    &font,
                );
            }
        }

        let bytes = doc.save_to_bytes().map_err(|e| RenderError::Encoding {
            reason: e.to_string(),
        })?;

        debug!(
            line_count = lines.len(),
            page_count = pages.len(),
            byte_len = bytes.len(),
            "Rendered shopping list PDF"
        );

        Ok(RenderedDocument {
            bytes,
            content_type: CONTENT_TYPE,
            filename: FILENAME.to_string(),
        })
    }
}
