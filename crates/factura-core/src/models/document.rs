//! Document, page, and block models produced by assembly.

use serde::{Deserialize, Serialize};

/// Where a page's canonical text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOrigin {
    /// Text recovered from the PDF content stream.
    Native,
    /// Text produced by the OCR engine from a page raster.
    Ocr,
}

/// A positioned run of text on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub text: String,

    /// `(x0, y0, x1, y1)` in PDF user units for native blocks. OCR-sourced
    /// blocks carry `(0, 0, 0, 0)` when the engine exposes no geometry.
    pub coords: (f32, f32, f32, f32),

    /// Engine confidence where available; absent for native blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Block {
    /// Whether the block carries real geometry.
    pub fn has_geometry(&self) -> bool {
        self.coords != (0.0, 0.0, 0.0, 0.0)
    }

    /// Whether the block's box intersects the given `(x0, y0, x1, y1)` region.
    pub fn intersects(&self, region: (f32, f32, f32, f32)) -> bool {
        let (x0, y0, x1, y1) = self.coords;
        let (rx0, ry0, rx1, ry1) = region;
        x0 < rx1 && rx0 < x1 && y0 < ry1 && ry0 < y1
    }
}

/// A single page after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number, contiguous from 1.
    pub number: u32,

    /// Canonical page text (native or OCR, per `source`).
    pub text: String,

    /// Layout blocks in reading order. Empty when layout was not requested.
    #[serde(default)]
    pub blocks: Vec<Block>,

    /// Text provenance for this page.
    pub source: PageOrigin,
}

/// PDF-level metadata read at open time, before any OCR work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub producer: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub encrypted: bool,

    /// True when any page carries a native text layer.
    pub has_native_text: bool,

    /// Raw XMP packet when the document embeds one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmp: Option<String>,
}

/// An assembled document. Immutable once built.
///
/// Invariant: `pages.len() == page_count as usize` and page numbers run
/// contiguously from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// SHA-256 of the input bytes, lowercase hex.
    pub raw_hash: String,

    pub page_count: u32,

    pub metadata: PdfMetadata,

    /// Pages in ascending page-number order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Full document text: page texts joined with `"\n"` in page order,
    /// so cross-page pattern matches respect document order.
    pub fn aggregated_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All blocks across pages, in reading order.
    pub fn all_blocks(&self) -> impl Iterator<Item = &Block> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }

    /// Number of pages whose text came from OCR.
    pub fn scanned_pages(&self) -> u32 {
        self.pages
            .iter()
            .filter(|p| p.source == PageOrigin::Ocr)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(number: u32, text: &str, source: PageOrigin) -> Page {
        Page {
            number,
            text: text.to_string(),
            blocks: Vec::new(),
            source,
        }
    }

    #[test]
    fn test_aggregated_text_joins_in_page_order() {
        let doc = Document {
            raw_hash: String::new(),
            page_count: 3,
            metadata: PdfMetadata::default(),
            pages: vec![
                page(1, "first", PageOrigin::Native),
                page(2, "second", PageOrigin::Ocr),
                page(3, "third", PageOrigin::Native),
            ],
        };
        assert_eq!(doc.aggregated_text(), "first\nsecond\nthird");
        assert_eq!(doc.scanned_pages(), 1);
    }

    #[test]
    fn test_block_intersects() {
        let block = Block {
            text: "Total".to_string(),
            coords: (100.0, 700.0, 200.0, 720.0),
            confidence: None,
        };
        assert!(block.intersects((0.0, 650.0, 300.0, 800.0)));
        assert!(!block.intersects((0.0, 0.0, 50.0, 50.0)));
        assert!(block.has_geometry());
    }
}
