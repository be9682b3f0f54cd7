//! Error types for the factura-core library.

use thiserror::Error;

/// Main error type for the factura library.
#[derive(Error, Debug)]
pub enum FacturaError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Template configuration error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Request validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to opening and reading PDF documents.
///
/// Fatal for the file being processed, never for the batch.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF byte stream.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from the PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to rasterize a page for OCR.
    #[error("failed to rasterize page {page}: {reason}")]
    PageRender { page: u32, reason: String },

    /// The PDF is encrypted and the empty password did not unlock it.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR recognition.
#[derive(Error, Debug)]
pub enum OcrError {
    /// No OCR engine is available in this runtime. Degrades a page to
    /// empty text with a diagnostic flag, never fails a document.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image handed to the engine.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors raised while loading the template store.
///
/// These are startup errors: a process with a broken template
/// configuration must not begin accepting documents.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The global default template is missing.
    #[error("default template not found under {0}")]
    MissingDefault(String),

    /// Two templates in one vendor directory share an identifier.
    #[error("duplicate template id '{id}' for vendor '{vendor}'")]
    DuplicateId { vendor: String, id: String },

    /// A template file could not be read or parsed.
    #[error("failed to load template {path}: {reason}")]
    Parse { path: String, reason: String },

    /// A field rule is malformed (bad regex, weight out of range).
    #[error("invalid rule '{field}' in template '{template}': {reason}")]
    InvalidRule {
        template: String,
        field: String,
        reason: String,
    },
}

/// A single request violation, one of possibly many.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Violation {
    /// Request field the violation refers to (e.g. `vendor`, `files[2]`).
    pub field: String,
    /// Human-readable description of the violation.
    pub error: String,
}

/// Malformed request. Carries every violation found, not just the first.
#[derive(Error, Debug)]
#[error("request validation failed ({} violations)", violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

/// Result type for the factura library.
pub type Result<T> = std::result::Result<T, FacturaError>;
