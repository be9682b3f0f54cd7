//! Tesseract engine driven through the system binary.

use std::io::ErrorKind;
use std::process::{Command, Stdio};

use image::DynamicImage;
use tracing::{debug, trace};

use super::{OcrLanguage, TextRecognizer};
use crate::error::OcrError;

/// OCR through a `tesseract` subprocess.
///
/// The page raster is written to a temporary PNG and recognized with
/// `tesseract <image> stdout -l <lang>`. One process per page keeps the
/// engine stateless and safe to share across worker tasks.
pub struct TesseractEngine {
    binary: String,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Whether the binary answers `--version`.
    pub fn available(binary: &str) -> bool {
        Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl TextRecognizer for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(
        &self,
        image: &DynamicImage,
        language: OcrLanguage,
    ) -> Result<String, OcrError> {
        let dir = tempfile::tempdir()
            .map_err(|e| OcrError::Recognition(format!("temp dir: {}", e)))?;
        let image_path = dir.path().join("page.png");
        image
            .save_with_format(&image_path, image::ImageFormat::Png)
            .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        trace!(
            "running {} on {}x{} raster, language {}",
            self.binary,
            image.width(),
            image.height(),
            language.tesseract_code()
        );

        let output = Command::new(&self.binary)
            .arg(&image_path)
            .arg("stdout")
            .arg("-l")
            .arg(language.tesseract_code())
            .output()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    OcrError::Unavailable(format!("tesseract binary '{}' not found", self.binary))
                } else {
                    OcrError::Recognition(e.to_string())
                }
            })?;

        if !output.status.success() {
            return Err(OcrError::Recognition(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("recognized {} characters", text.len());
        Ok(text)
    }
}
