//! Data models for documents, results, and configuration.

pub mod config;
pub mod document;
pub mod result;

pub use config::FacturaConfig;
pub use document::{Block, Document, Page, PageOrigin, PdfMetadata};
pub use result::{
    Diagnostics, Evidence, ExtractedField, FieldValue, FileOutcome, PdfProperties, PiiEntity,
    PiiKind, ProcessingResult, TaxLine,
};
