//! Shopping-list document rendering.

mod pdf;

pub use pdf::{layout_lines, PdfRenderer, PlacedText, RenderedPage, A4_HEIGHT_MM, A4_WIDTH_MM};

use pantry_core::{AggregatedLine, RenderError};

/// A finished document ready to stream to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Turns an aggregated shopping list into a downloadable document.
///
/// Implementations are synchronous and CPU-bound; async callers should run
/// them on a blocking thread.
pub trait ShoppingListRenderer: Send + Sync {
    /// Render `lines` in the order given. Empty input is an error.
    fn render(&self, lines: &[AggregatedLine]) -> Result<RenderedDocument, RenderError>;
}
