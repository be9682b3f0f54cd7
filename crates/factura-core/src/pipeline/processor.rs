//! Per-document processing: open, assemble, select, extract, redact.

use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::Result;
use crate::extract::{overall_confidence, FieldExtractor};
use crate::models::config::FacturaConfig;
use crate::models::document::{Block, Document};
use crate::models::result::{PdfProperties, ProcessingResult};
use crate::ocr::{resolve_engine, OcrLanguage, TextRecognizer};
use crate::pdf::{PageSource, PdfReader};
use crate::redact::PiiRedactor;
use crate::template::{TemplateSelection, TemplateStore};

use super::DocumentAssembler;

/// Per-file options resolved from a request or CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Vendor whose templates to consult; the default template is used
    /// directly when absent.
    pub vendor: Option<String>,
    pub force_ocr: bool,
    /// Language hint for OCR; falls back to the configured default.
    pub language: Option<OcrLanguage>,
}

/// Processes one document at a time; safe to share across workers.
///
/// The OCR engine is resolved once at construction, so per-file calls
/// never probe for binaries.
pub struct DocumentProcessor {
    config: FacturaConfig,
    store: TemplateStore,
    recognizer: Box<dyn TextRecognizer>,
    extractor: FieldExtractor,
    redactor: PiiRedactor,
}

impl DocumentProcessor {
    pub fn new(config: FacturaConfig, store: TemplateStore) -> Self {
        let recognizer = resolve_engine(&config.ocr);
        let redactor = PiiRedactor::new(config.redaction.mask.clone());
        Self {
            config,
            store,
            recognizer,
            extractor: FieldExtractor::new(),
            redactor,
        }
    }

    /// Replace the resolved OCR engine with a custom recognizer.
    pub fn with_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn config(&self) -> &FacturaConfig {
        &self.config
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Run the full pipeline over one file's bytes.
    ///
    /// Extraction always sees the original text; when redaction is
    /// enabled, every text surface of the returned record is masked
    /// afterwards and the findings ride along as `entities`.
    pub fn process(
        &self,
        filename: &str,
        data: &[u8],
        options: &ProcessOptions,
    ) -> Result<ProcessingResult> {
        let started = Instant::now();

        let mut hasher = Sha256::new();
        hasher.update(data);
        let hash = format!("{:x}", hasher.finalize());

        let mut reader = PdfReader::new();
        reader.open(data)?;
        let metadata = reader.metadata();

        let language = options.language.unwrap_or(self.config.ocr.default_language);
        let assembler = DocumentAssembler::new(&self.config.pdf, self.recognizer.as_ref());
        let (pages, mut diagnostics) = assembler.assemble(&reader, language, options.force_ocr)?;
        diagnostics.pdf_type = reader.classify();

        let mut document = Document {
            raw_hash: hash,
            page_count: pages.len() as u32,
            metadata,
            pages,
        };

        let selection = match options.vendor.as_deref() {
            Some(vendor) => self.store.select(vendor, filename),
            None => TemplateSelection {
                template: self.store.default_template(),
                warnings: Vec::new(),
            },
        };
        let template_id = selection.template.id.clone();

        let text_full = document.aggregated_text();
        let blocks: Vec<Block> = document.all_blocks().cloned().collect();
        let fields = self
            .extractor
            .extract(selection.template, &text_full, &blocks);
        let overall = overall_confidence(&fields);
        let template_warnings = selection.warnings;

        let (text_full, entities) = if self.config.redaction.enabled {
            let (masked, entities) = self.redactor.redact(&text_full);
            for page in &mut document.pages {
                page.text = self.redactor.mask_text(&page.text);
                for block in &mut page.blocks {
                    block.text = self.redactor.mask_text(&block.text);
                }
            }
            (masked, Some(entities))
        } else {
            (text_full, None)
        };

        let result = ProcessingResult {
            filename: filename.to_string(),
            hash_sha256: document.raw_hash.clone(),
            pages_count: document.page_count,
            pdf_properties: PdfProperties {
                producer: document.metadata.producer.clone(),
                creation_date: document.metadata.created_at.clone(),
                mod_date: document.metadata.modified_at.clone(),
                is_encrypted: document.metadata.encrypted,
                has_text: document.metadata.has_native_text,
                xmp_metadata: document.metadata.xmp.clone(),
            },
            text_full,
            pages: document.pages,
            fields,
            overall_confidence: overall,
            template_id,
            template_warnings,
            diagnostics,
            entities,
        };

        info!(
            "processed '{}': template '{}', {} pages ({} scanned), confidence {:.2}, took {:?}",
            filename,
            result.template_id,
            result.pages_count,
            result.diagnostics.scanned_pages,
            result.overall_confidence,
            started.elapsed()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::FieldValue;
    use crate::ocr::FixedRecognizer;
    use crate::pdf::{sample_pdf, PdfType};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn write_store(dir: &Path) -> TemplateStore {
        std::fs::create_dir_all(dir.join("default")).unwrap();
        std::fs::write(
            dir.join("default/default.yml"),
            concat!(
                "fields:\n",
                "  invoice_number:\n",
                "    pattern: '(?i)factura[:\\s#-]*([A-Za-z0-9/.-]+)'\n",
                "    confidence_weight: 0.9\n",
                "  total:\n",
                "    pattern: '(?i)total[:\\s]*([0-9]+[,.][0-9]{2})'\n",
                "    confidence_weight: 0.95\n",
                "    normalizer: amount\n",
            ),
        )
        .unwrap();
        TemplateStore::load(dir).unwrap()
    }

    fn native_config() -> FacturaConfig {
        let mut config = FacturaConfig::default();
        // Keep the short sample pages on the native path.
        config.pdf.text_threshold = 1;
        config
    }

    fn processor(config: FacturaConfig) -> DocumentProcessor {
        let dir = tempfile::tempdir().unwrap();
        let store = write_store(dir.path());
        DocumentProcessor::new(config, store)
            .with_recognizer(Box::new(FixedRecognizer("TEXTO OCR")))
    }

    #[test]
    fn test_native_pdf_end_to_end() {
        let pdf = sample_pdf(&["Factura: F-2024-001", "Total: 96,80 EUR"]);
        let processor = processor(native_config());

        let result = processor
            .process("factura_enero.pdf", &pdf, &ProcessOptions::default())
            .unwrap();

        assert_eq!(result.filename, "factura_enero.pdf");
        assert_eq!(result.hash_sha256.len(), 64);
        assert_eq!(result.pages_count, 2);
        assert_eq!(result.template_id, "default");
        assert!(result.template_warnings.is_empty());
        assert!(result.text_full.contains("F-2024-001"));
        assert!(result.pdf_properties.has_text);
        assert!(!result.pdf_properties.is_encrypted);

        assert_eq!(
            result.fields["invoice_number"].value,
            Some(FieldValue::Text("F-2024-001".to_string()))
        );
        assert_eq!(
            result.fields["total"].value,
            Some(FieldValue::Text("96.80".to_string()))
        );
        assert_eq!(result.overall_confidence, 1.0);
        assert_eq!(result.diagnostics.pdf_type, PdfType::Text);
        assert_eq!(result.diagnostics.scanned_pages, 0);
        assert!(result.entities.is_none());
    }

    #[test]
    fn test_unknown_vendor_warns_and_uses_default() {
        let pdf = sample_pdf(&["Factura: F-1 Total: 10,00"]);
        let processor = processor(native_config());
        let options = ProcessOptions {
            vendor: Some("nadie".to_string()),
            ..ProcessOptions::default()
        };

        let result = processor.process("f.pdf", &pdf, &options).unwrap();

        assert_eq!(result.template_id, "default");
        assert_eq!(result.template_warnings.len(), 1);
        assert!(result.template_warnings[0].contains("nadie"));
    }

    #[test]
    fn test_redaction_masks_record_and_reports_entities() {
        let pdf = sample_pdf(&["Factura: F-1", "Contacto: ana@example.com"]);
        let mut config = native_config();
        config.redaction.enabled = true;
        let processor = processor(config);

        let result = processor
            .process("f.pdf", &pdf, &ProcessOptions::default())
            .unwrap();

        assert!(!result.text_full.contains("ana@example.com"));
        assert!(result.text_full.contains("***"));
        assert!(!result.pages[1].text.contains("ana@example.com"));
        for block in &result.pages[1].blocks {
            assert!(!block.text.contains("ana@example.com"));
        }

        let entities = result.entities.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].value, "ana@example.com");
    }

    #[test]
    fn test_unreadable_bytes_fail_the_file() {
        let processor = processor(native_config());
        let err = processor
            .process("bad.pdf", b"not a pdf at all", &ProcessOptions::default())
            .unwrap_err();
        assert!(matches!(err, crate::error::FacturaError::Pdf(_)));
    }

    #[test]
    fn test_force_ocr_marks_pages_scanned() {
        let pdf = sample_pdf(&["Factura: F-2024-001"]);
        let processor = processor(native_config());
        let options = ProcessOptions {
            force_ocr: true,
            ..ProcessOptions::default()
        };

        let result = processor.process("f.pdf", &pdf, &options).unwrap();

        // The sample PDF has no embedded raster, so forced OCR cannot
        // rasterize and the page degrades to empty text.
        assert_eq!(result.diagnostics.scanned_pages, 1);
        assert_eq!(result.diagnostics.ocr_failed_pages, 1);
        assert_eq!(result.pages[0].text, "");
    }
}
