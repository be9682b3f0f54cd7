//! Page assembly: the native-versus-OCR decision, taken per page.

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::config::PdfConfig;
use crate::models::document::{Block, Page, PageOrigin};
use crate::models::result::Diagnostics;
use crate::ocr::{OcrLanguage, TextRecognizer};
use crate::pdf::PageSource;

/// Turns an opened PDF into pages, sending thin pages through OCR.
pub struct DocumentAssembler<'a> {
    config: &'a PdfConfig,
    recognizer: &'a dyn TextRecognizer,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(config: &'a PdfConfig, recognizer: &'a dyn TextRecognizer) -> Self {
        Self { config, recognizer }
    }

    /// Assemble every page of the source into canonical text and blocks.
    ///
    /// A page takes the OCR route when the caller forces it or when its
    /// trimmed native text is shorter than the configured threshold.
    /// OCR trouble on a page degrades that page to empty text and is
    /// counted in the diagnostics; it never fails the document.
    pub fn assemble(
        &self,
        source: &dyn PageSource,
        language: OcrLanguage,
        force_ocr: bool,
    ) -> Result<(Vec<Page>, Diagnostics)> {
        let total = source.page_count();
        let limit = if self.config.max_pages > 0 {
            total.min(self.config.max_pages as u32)
        } else {
            total
        };

        let mut pages = Vec::with_capacity(limit as usize);
        let mut diagnostics = Diagnostics::default();

        for number in 1..=limit {
            let native = source.native_text(number)?;
            let wants_ocr =
                force_ocr || native.trim().chars().count() < self.config.text_threshold;
            debug!(
                "page {}: native length {}, ocr {}",
                number,
                native.trim().chars().count(),
                wants_ocr
            );

            let page = if wants_ocr {
                diagnostics.scanned_pages += 1;
                if diagnostics.ocr_engine_used.is_none() {
                    diagnostics.ocr_engine_used = Some(self.recognizer.name().to_string());
                }
                match self.recognize_page(source, number, language) {
                    Ok(text) => Page {
                        number,
                        blocks: ocr_blocks(&text),
                        text,
                        source: PageOrigin::Ocr,
                    },
                    Err(err) => {
                        warn!("page {} ocr failed, degrading to empty: {}", number, err);
                        diagnostics.ocr_failed_pages += 1;
                        Page {
                            number,
                            text: String::new(),
                            blocks: Vec::new(),
                            source: PageOrigin::Ocr,
                        }
                    }
                }
            } else {
                let blocks = if self.config.extract_blocks {
                    match source.native_blocks(number) {
                        Ok(blocks) => blocks,
                        Err(err) => {
                            warn!("page {} block extraction failed: {}", number, err);
                            Vec::new()
                        }
                    }
                } else {
                    Vec::new()
                };
                Page {
                    number,
                    text: native,
                    blocks,
                    source: PageOrigin::Native,
                }
            };
            pages.push(page);
        }

        Ok((pages, diagnostics))
    }

    fn recognize_page(
        &self,
        source: &dyn PageSource,
        number: u32,
        language: OcrLanguage,
    ) -> Result<String> {
        let raster = source.rasterize(number, self.config.render_dpi)?;
        Ok(self.recognizer.recognize(&raster, language)?)
    }
}

/// OCR output carries no geometry, so the page text becomes one block
/// with degenerate coordinates.
fn ocr_blocks(text: &str) -> Vec<Block> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    vec![Block {
        text: text.to_string(),
        coords: (0.0, 0.0, 0.0, 0.0),
        confidence: None,
    }]
}
