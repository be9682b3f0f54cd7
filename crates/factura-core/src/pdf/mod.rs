//! PDF reading: metadata, native text, layout blocks, page rasters.

mod reader;

pub use reader::PdfReader;

use crate::error::PdfError;
use crate::models::document::{Block, PdfMetadata};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Classification of a PDF by its native content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfType {
    /// Carries a usable native text layer.
    Text,
    /// Raster content only (scanned document).
    Image,
    /// Some pages with text, some scanned.
    Hybrid,
    /// No recoverable content.
    #[default]
    Empty,
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Capability seam over a PDF backend.
///
/// Opening parses structure and the native text layer only; rasters are
/// produced on demand so documents that never need OCR never pay for it.
pub trait PageSource {
    /// Parse a PDF byte stream. Corrupt bytes or encryption that the
    /// empty password cannot clear fail here and abort the file.
    fn open(&mut self, data: &[u8]) -> Result<()>;

    /// Number of pages in the opened document.
    fn page_count(&self) -> u32;

    /// Document-level metadata, available right after `open`.
    fn metadata(&self) -> PdfMetadata;

    /// Native text for a 1-based page, without OCR.
    fn native_text(&self, page: u32) -> Result<String>;

    /// Layout blocks for a 1-based page, in content order.
    fn native_blocks(&self, page: u32) -> Result<Vec<Block>>;

    /// Raster of a 1-based page for OCR at the given target DPI.
    fn rasterize(&self, page: u32, dpi: u32) -> Result<DynamicImage>;
}

/// Build a one-page-per-entry PDF for tests, one text line per page.
#[cfg(test)]
pub(crate) fn sample_pdf(page_texts: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize sample pdf");
    bytes
}
