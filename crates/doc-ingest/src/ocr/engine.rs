//! Tesseract wrapper

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{IngestConfig, OcrConfig};
use crate::error::{Error, Result};
use crate::ingestion::tools;

use super::ImagePreprocessor;

/// OCR engine bound to a fixed language set and recognition modes
#[derive(Debug, Clone)]
pub struct OcrEngine {
    config: OcrConfig,
    temp_root: PathBuf,
    preprocessor: ImagePreprocessor,
}

impl OcrEngine {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            config: config.ocr.clone(),
            temp_root: config.temp_root(),
            preprocessor: ImagePreprocessor::new(),
        }
    }

    /// Whether the engine binary can be launched
    pub fn is_available(&self) -> bool {
        tools::is_available(&self.config.binary, "--version")
    }

    /// Recognize text in an image. Any failure yields an empty string.
    pub fn recognize(&self, image: &Path) -> String {
        match self.recognize_checked(image) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("OCR failed for {}: {}", image.display(), e);
                String::new()
            }
        }
    }

    /// Recognize text in an image, reporting why recognition failed
    pub fn recognize_checked(&self, image: &Path) -> Result<String> {
        if !self.config.preprocess {
            return self.run_engine(image);
        }

        let scratch = match tempfile::Builder::new()
            .prefix("ocr-")
            .tempdir_in(&self.temp_root)
        {
            Ok(scratch) => scratch,
            Err(e) => {
                tracing::warn!(
                    "No scratch dir in {} ({}), recognizing {} without preprocessing",
                    self.temp_root.display(),
                    e,
                    image.display()
                );
                return self.run_engine(image);
            }
        };

        let input = match self.preprocessor.preprocess_file(image, scratch.path()) {
            Ok(processed) => processed,
            Err(e) => {
                tracing::debug!(
                    "Preprocessing {} failed, using original: {}",
                    image.display(),
                    e
                );
                image.to_path_buf()
            }
        };

        self.run_engine(&input)
    }

    fn run_engine(&self, image: &Path) -> Result<String> {
        let mut command = Command::new(&self.config.binary);
        command
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.config.languages])
            .args(["--oem", &self.config.engine_mode.to_string()])
            .args(["--psm", &self.config.page_seg_mode.to_string()]);

        let output = tools::run_checked(&mut command, &self.config.binary, self.config.timeout())?;
        let raw = String::from_utf8(output.stdout).map_err(|e| {
            Error::external_tool(&self.config.binary, format!("non UTF-8 output: {}", e))
        })?;

        Ok(postprocess(&raw))
    }
}

/// Drop blank lines, trim each line and collapse runs of spaces
pub fn postprocess(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
