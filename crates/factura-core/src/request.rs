//! Ingestion requests and their admission checks.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ValidationError, Violation};
use crate::models::config::LimitsConfig;
use crate::ocr::OcrLanguage;

lazy_static! {
    static ref VENDOR_RE: Regex = Regex::new(r"^[a-z0-9_-]{2,50}$").unwrap();
}

/// One file submitted for processing.
#[derive(Debug, Clone)]
pub struct IngestFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl IngestFile {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            bytes,
        }
    }
}

/// A processing request covering one or more files.
///
/// Language validity is carried by the [`OcrLanguage`] type itself;
/// everything else is checked by [`IngestRequest::validate`].
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub files: Vec<IngestFile>,
    pub vendor: String,
    pub force_ocr: bool,
    pub language: Option<OcrLanguage>,
    pub options: Option<serde_json::Value>,
}

impl IngestRequest {
    pub fn new(files: Vec<IngestFile>, vendor: impl Into<String>) -> Self {
        Self {
            files,
            vendor: vendor.into(),
            force_ocr: false,
            language: None,
            options: None,
        }
    }

    /// Check the request against the configured limits.
    ///
    /// Every violation is collected before returning, so a caller can
    /// report all problems in one round trip instead of fixing them
    /// one at a time.
    pub fn validate(&self, limits: &LimitsConfig) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if self.files.is_empty() {
            violations.push(Violation {
                field: "files".to_string(),
                error: "at least one file is required".to_string(),
            });
        } else if self.files.len() > limits.max_files {
            violations.push(Violation {
                field: "files".to_string(),
                error: format!(
                    "{} files submitted, limit is {}",
                    self.files.len(),
                    limits.max_files
                ),
            });
        }

        if !VENDOR_RE.is_match(&self.vendor) {
            violations.push(Violation {
                field: "vendor".to_string(),
                error: format!(
                    "'{}' is not a valid vendor id (2-50 chars of a-z, 0-9, '_', '-')",
                    self.vendor
                ),
            });
        }

        for (index, file) in self.files.iter().enumerate() {
            if !limits.allowed_mime_types.iter().any(|m| m == &file.mime) {
                violations.push(Violation {
                    field: format!("files[{index}]"),
                    error: format!("unsupported media type '{}'", file.mime),
                });
            }
        }

        if let Some(options) = &self.options {
            if !options.is_object() {
                violations.push(Violation {
                    field: "options".to_string(),
                    error: "options must be a JSON object".to_string(),
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pdf_file(name: &str) -> IngestFile {
        IngestFile::new(name, "application/pdf", vec![b'%'])
    }

    #[test]
    fn test_valid_request_passes() {
        let request = IngestRequest::new(vec![pdf_file("a.pdf")], "acme_supplies");
        assert!(request.validate(&LimitsConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_file_list_rejected() {
        let request = IngestRequest::new(vec![], "acme_supplies");
        let err = request.validate(&LimitsConfig::default()).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "files");
    }

    #[test]
    fn test_too_many_files_rejected() {
        let files = (0..26).map(|i| pdf_file(&format!("f{i}.pdf"))).collect();
        let request = IngestRequest::new(files, "acme_supplies");
        let err = request.validate(&LimitsConfig::default()).unwrap_err();
        assert_eq!(err.violations[0].field, "files");
        assert!(err.violations[0].error.contains("limit is 25"));
    }

    #[test]
    fn test_vendor_id_pattern() {
        for bad in ["", "a", "Mixed-Case", "con espacios", "ñandu"] {
            let request = IngestRequest::new(vec![pdf_file("a.pdf")], bad);
            let err = request.validate(&LimitsConfig::default()).unwrap_err();
            assert_eq!(err.violations[0].field, "vendor", "vendor {bad:?}");
        }
        let longest = "a".repeat(50);
        for good in ["ok", "acme_supplies", "v-2024", longest.as_str()] {
            let request = IngestRequest::new(vec![pdf_file("a.pdf")], good);
            assert!(
                request.validate(&LimitsConfig::default()).is_ok(),
                "vendor {good:?}"
            );
        }
    }

    #[test]
    fn test_mime_violations_name_the_file() {
        let request = IngestRequest::new(
            vec![
                pdf_file("ok.pdf"),
                IngestFile::new("nope.png", "image/png", vec![]),
            ],
            "acme_supplies",
        );
        let err = request.validate(&LimitsConfig::default()).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "files[1]");
        assert!(err.violations[0].error.contains("image/png"));
    }

    #[test]
    fn test_options_must_be_an_object() {
        let mut request = IngestRequest::new(vec![pdf_file("a.pdf")], "acme_supplies");
        request.options = Some(serde_json::json!(["not", "an", "object"]));
        let err = request.validate(&LimitsConfig::default()).unwrap_err();
        assert_eq!(err.violations[0].field, "options");

        request.options = Some(serde_json::json!({"priority": "high"}));
        assert!(request.validate(&LimitsConfig::default()).is_ok());
    }

    #[test]
    fn test_all_violations_reported_together() {
        let mut request = IngestRequest::new(
            vec![IngestFile::new("nope.txt", "text/plain", vec![])],
            "BAD VENDOR",
        );
        request.options = Some(serde_json::json!(42));

        let err = request.validate(&LimitsConfig::default()).unwrap_err();
        let fields: Vec<&str> = err.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["vendor", "files[0]", "options"]);
    }
}
