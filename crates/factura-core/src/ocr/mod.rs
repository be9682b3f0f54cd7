//! OCR engine seam and selection policy.
//!
//! The pipeline talks to OCR through [`TextRecognizer`]. The policy is
//! resolved once at startup into exactly one concrete engine; pages are
//! never probed against multiple engines.

mod tesseract;

pub use tesseract::TesseractEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Request language hints, constrained to the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrLanguage {
    /// Spanish.
    Es,
    /// Galician.
    Gl,
    /// English.
    En,
}

impl OcrLanguage {
    /// Traineddata code the tesseract binary expects.
    pub fn tesseract_code(&self) -> &'static str {
        match self {
            OcrLanguage::Es => "spa",
            OcrLanguage::Gl => "glg",
            OcrLanguage::En => "eng",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            OcrLanguage::Es => "es",
            OcrLanguage::Gl => "gl",
            OcrLanguage::En => "en",
        }
    }
}

impl Default for OcrLanguage {
    fn default() -> Self {
        OcrLanguage::Es
    }
}

impl std::fmt::Display for OcrLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for OcrLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "es" => Ok(OcrLanguage::Es),
            "gl" => Ok(OcrLanguage::Gl),
            "en" => Ok(OcrLanguage::En),
            other => Err(format!("unsupported language '{}', expected es, gl or en", other)),
        }
    }
}

/// Engine selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePolicy {
    /// Use tesseract when the binary is present, otherwise run without OCR.
    #[default]
    Auto,
    /// Require tesseract.
    Tesseract,
    /// Never run OCR.
    Disabled,
}

impl std::str::FromStr for EnginePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(EnginePolicy::Auto),
            "tesseract" => Ok(EnginePolicy::Tesseract),
            "disabled" | "none" => Ok(EnginePolicy::Disabled),
            other => Err(format!("unknown engine policy '{}'", other)),
        }
    }
}

/// A concrete OCR engine.
pub trait TextRecognizer: Send + Sync {
    /// Engine name reported in diagnostics.
    fn name(&self) -> &str;

    /// Recognize text on a page raster.
    fn recognize(&self, image: &DynamicImage, language: OcrLanguage)
        -> Result<String, OcrError>;
}

/// Stand-in engine for runtimes without OCR capability.
///
/// Returning an error here, rather than empty text, keeps "no engine"
/// distinguishable from "engine found no text" in diagnostics.
pub struct UnavailableEngine {
    reason: String,
}

impl UnavailableEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextRecognizer for UnavailableEngine {
    fn name(&self) -> &str {
        "none"
    }

    fn recognize(
        &self,
        _image: &DynamicImage,
        _language: OcrLanguage,
    ) -> Result<String, OcrError> {
        Err(OcrError::Unavailable(self.reason.clone()))
    }
}

/// Resolve the configured policy into one concrete engine.
pub fn resolve_engine(config: &OcrConfig) -> Box<dyn TextRecognizer> {
    match config.engine {
        EnginePolicy::Disabled => {
            info!("OCR disabled by configuration");
            Box::new(UnavailableEngine::new("OCR disabled by configuration"))
        }
        EnginePolicy::Tesseract => {
            // Required engine is kept even when the probe fails; pages
            // then report the spawn error instead of a silent skip.
            if !TesseractEngine::available(&config.tesseract_binary) {
                warn!(
                    binary = %config.tesseract_binary,
                    "required tesseract binary not found, OCR pages will fail"
                );
            }
            Box::new(TesseractEngine::new(&config.tesseract_binary))
        }
        EnginePolicy::Auto => {
            if TesseractEngine::available(&config.tesseract_binary) {
                info!(binary = %config.tesseract_binary, "tesseract OCR engine ready");
                Box::new(TesseractEngine::new(&config.tesseract_binary))
            } else {
                warn!(
                    binary = %config.tesseract_binary,
                    "tesseract binary not found, scanned pages will yield empty text"
                );
                Box::new(UnavailableEngine::new(format!(
                    "tesseract binary '{}' not found",
                    config.tesseract_binary
                )))
            }
        }
    }
}

/// Test engine returning a fixed transcript.
#[cfg(test)]
pub(crate) struct FixedRecognizer(pub &'static str);

#[cfg(test)]
impl TextRecognizer for FixedRecognizer {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(
        &self,
        _image: &DynamicImage,
        _language: OcrLanguage,
    ) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}
