//! Core library for the invoice extraction pipeline.
//!
//! This crate provides:
//! - PDF reading (metadata, per-page native text, layout blocks, page rasters)
//! - OCR through a pluggable engine (tesseract subprocess by default)
//! - Vendor template selection and data-driven field extraction
//! - Coverage-based confidence scoring and PII redaction
//! - Batch processing with a bounded worker pool and per-file timeouts

pub mod error;
pub mod models;
pub mod pdf;
pub mod ocr;
pub mod template;
pub mod extract;
pub mod redact;
pub mod pipeline;
pub mod request;

pub use error::{FacturaError, Result};
pub use models::config::FacturaConfig;
pub use models::document::{Block, Document, Page, PageOrigin};
pub use models::result::{ExtractedField, FileOutcome, ProcessingResult};
pub use pdf::{PageSource, PdfReader, PdfType};
pub use ocr::{resolve_engine, EnginePolicy, OcrLanguage, TextRecognizer};
pub use template::{FieldRule, Template};
pub use template::store::TemplateStore;
pub use extract::FieldExtractor;
pub use redact::PiiRedactor;
pub use pipeline::{BatchRunner, DocumentProcessor, ProcessOptions};
pub use request::{IngestFile, IngestRequest};
