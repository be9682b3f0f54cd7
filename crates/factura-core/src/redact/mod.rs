//! PII detection and masking over document text.
//!
//! Detection runs over the original text only; masking is a single
//! left-to-right rewrite of the accepted spans. Masked text never
//! feeds back into detection, which keeps the operation idempotent.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::result::{PiiEntity, PiiKind};

pub const DEFAULT_MASK: &str = "***";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"(?i)[\w.]+@[\w.]+").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"\+?\d[\d\s]{7,}\d").unwrap();
    static ref IBAN_RE: Regex = Regex::new(r"(?i)[A-Z]{2}\d{2}[A-Z0-9]{1,30}").unwrap();
}

/// Masks emails, phone numbers and IBANs in free text.
pub struct PiiRedactor {
    mask: String,
}

impl PiiRedactor {
    pub fn new(mask: impl Into<String>) -> Self {
        Self { mask: mask.into() }
    }

    /// Detect sensitive spans and rewrite them with the mask.
    ///
    /// Returns the masked text together with the findings; each entity
    /// keeps the original value and its span in the input text.
    pub fn redact(&self, text: &str) -> (String, Vec<PiiEntity>) {
        let entities = detect(text);
        if entities.is_empty() {
            return (text.to_string(), entities);
        }
        debug!("masking {} sensitive spans", entities.len());

        let mut masked = String::with_capacity(text.len());
        let mut cursor = 0;
        for entity in &entities {
            let (start, end) = entity.span;
            masked.push_str(&text[cursor..start]);
            masked.push_str(&self.mask);
            cursor = end;
        }
        masked.push_str(&text[cursor..]);
        (masked, entities)
    }

    /// Masked text only, for fragments whose findings are reported
    /// from the aggregated document pass.
    pub fn mask_text(&self, text: &str) -> String {
        self.redact(text).0
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new(DEFAULT_MASK)
    }
}

/// Collect matches from every detector, then resolve overlaps.
///
/// Spans are ordered by start position, longest first among equal
/// starts; a span overlapping an already accepted one is dropped, so
/// the survivors never intersect and rewrite positions stay valid.
fn detect(text: &str) -> Vec<PiiEntity> {
    let mut found: Vec<PiiEntity> = Vec::new();
    for (kind, re) in [
        (PiiKind::Email, &*EMAIL_RE),
        (PiiKind::Phone, &*PHONE_RE),
        (PiiKind::Iban, &*IBAN_RE),
    ] {
        for m in re.find_iter(text) {
            found.push(PiiEntity {
                kind,
                value: m.as_str().to_string(),
                span: (m.start(), m.end()),
            });
        }
    }

    found.sort_by(|a, b| a.span.0.cmp(&b.span.0).then(b.span.1.cmp(&a.span.1)));

    let mut accepted: Vec<PiiEntity> = Vec::new();
    let mut end_watermark = 0;
    for entity in found {
        if entity.span.0 >= end_watermark {
            end_watermark = entity.span.1;
            accepted.push(entity);
        }
    }
    accepted
}
