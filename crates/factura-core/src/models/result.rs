//! Per-file result records returned to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::document::Page;
use crate::pdf::PdfType;

/// PDF properties reported alongside extraction output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfProperties {
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    pub is_encrypted: bool,
    pub has_text: bool,
    pub xmp_metadata: Option<String>,
}

/// A tax line captured by the `repeated` normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    /// Rate label as matched, e.g. `"21%"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Amount normalized to a dot decimal separator, e.g. `"100.00"`.
    pub amount: String,
}

/// Value of an extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Taxes(Vec<TaxLine>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Taxes(_) => None,
        }
    }
}

/// The literal matched span backing an extracted value and, for
/// block-scoped rules, its position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coords: Option<(f32, f32, f32, f32)>,
}

/// One field in the result mapping.
///
/// Unmatched fields stay in the mapping with `value: None` and zero
/// confidence so consumers see a stable field set per template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: Option<FieldValue>,

    /// Static per-rule certainty in `[0, 1]`, not match quality.
    pub confidence: f32,

    pub evidence: Evidence,
}

impl ExtractedField {
    /// The record for a field whose rule found no match.
    pub fn absent() -> Self {
        Self {
            value: None,
            confidence: 0.0,
            evidence: Evidence::default(),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }
}

/// PII entity kinds recognized by the redactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    Phone,
    Iban,
}

/// A sensitive span found in the document text.
///
/// `value` and `span` refer to the original, unmasked text so the
/// finding stays auditable after masking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiEntity {
    #[serde(rename = "type")]
    pub kind: PiiKind,
    pub value: String,
    pub span: (usize, usize),
}

/// Counters accumulated while assembling a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Content classification of the source document.
    pub pdf_type: PdfType,

    /// Pages whose canonical text came from OCR.
    pub scanned_pages: u32,

    /// Name of the OCR engine that ran, when any page needed one.
    pub ocr_engine_used: Option<String>,

    /// Pages where OCR was wanted but recognition failed or no engine
    /// was available; those pages degrade to empty text.
    pub ocr_failed_pages: u32,
}

/// The complete per-file result record. Never mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub filename: String,

    /// SHA-256 of the uploaded bytes, lowercase hex.
    pub hash_sha256: String,

    pub pages_count: u32,

    pub pdf_properties: PdfProperties,

    /// Aggregated document text; masked when redaction is enabled.
    pub text_full: String,

    pub pages: Vec<Page>,

    /// Field name to extraction outcome, stably ordered by name.
    pub fields: BTreeMap<String, ExtractedField>,

    /// Coverage ratio over `fields`, in `[0, 1]`.
    pub overall_confidence: f32,

    /// Identifier of the template that produced `fields`.
    pub template_id: String,

    /// Non-fatal selection notes, e.g. vendor lookup falling back to default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_warnings: Vec<String>,

    pub diagnostics: Diagnostics,

    /// Present only when redaction ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<PiiEntity>>,
}

/// Outcome of one file in a batch: a full result, or an inline error that
/// leaves the rest of the batch untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FileOutcome {
    Ok(Box<ProcessingResult>),
    Err { filename: String, error: String },
}

impl FileOutcome {
    pub fn failed(filename: impl Into<String>, error: impl std::fmt::Display) -> Self {
        FileOutcome::Err {
            filename: filename.into(),
            error: error.to_string(),
        }
    }

    pub fn as_ok(&self) -> Option<&ProcessingResult> {
        match self {
            FileOutcome::Ok(result) => Some(result),
            FileOutcome::Err { .. } => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FileOutcome::Ok(_))
    }
}
