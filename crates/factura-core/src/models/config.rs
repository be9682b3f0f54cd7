//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ocr::{EnginePolicy, OcrLanguage};

/// Main configuration for the factura pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacturaConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// Template store configuration.
    pub templates: TemplatesConfig,

    /// Batch worker pool configuration.
    pub batch: BatchConfig,

    /// Request validation limits.
    pub limits: LimitsConfig,

    /// PII redaction configuration.
    pub redaction: RedactionConfig,
}

impl Default for FacturaConfig {
    fn default() -> Self {
        Self {
            pdf: PdfConfig::default(),
            ocr: OcrConfig::default(),
            templates: TemplatesConfig::default(),
            batch: BatchConfig::default(),
            limits: LimitsConfig::default(),
            redaction: RedactionConfig::default(),
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// DPI for rasterizing pages handed to OCR.
    pub render_dpi: u32,

    /// Minimum trimmed native text length for a page to skip OCR.
    pub text_threshold: usize,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,

    /// Extract layout blocks from native pages.
    pub extract_blocks: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_dpi: 200,
            text_threshold: 200,
            max_pages: 0,
            extract_blocks: true,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Engine selection policy, resolved once at startup.
    pub engine: EnginePolicy,

    /// Language used when a request carries no hint.
    pub default_language: OcrLanguage,

    /// Name or path of the tesseract binary.
    pub tesseract_binary: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: EnginePolicy::Auto,
            default_language: OcrLanguage::Es,
            tesseract_binary: "tesseract".to_string(),
        }
    }
}

/// Template store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory holding one subdirectory per vendor plus `default/`.
    pub dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("templates"),
        }
    }
}

/// Batch worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrent per-file jobs (0 = available CPU parallelism).
    pub workers: usize,

    /// Per-file deadline in seconds; a file past it reports an error
    /// without touching its siblings.
    pub timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            timeout_secs: 120,
        }
    }
}

/// Request validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum files per request.
    pub max_files: usize,

    /// MIME types accepted for upload.
    pub allowed_mime_types: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files: 25,
            allowed_mime_types: vec!["application/pdf".to_string()],
        }
    }
}

/// PII redaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Redact text and report entities in results.
    pub enabled: bool,

    /// Replacement token for masked spans.
    pub mask: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mask: "***".to_string(),
        }
    }
}

impl FacturaConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Effective worker count for the batch pool.
    pub fn worker_count(&self) -> usize {
        if self.batch.workers > 0 {
            self.batch.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
