//! Format dispatch
//!
//! Every supported [`FileType`] maps to exactly one [`FormatExtractor`]. The
//! table is fixed at compile time; adding a format means adding a variant and
//! an arm here.

use std::time::Instant;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::ingestion::docx::DocxExtractor;
use crate::ingestion::legacy::LegacyDocReader;
use crate::ingestion::pdf::PdfExtractor;
use crate::ingestion::text::TextDecoder;
use crate::ocr::OcrEngine;
use crate::types::{FileType, SourceFile};

/// One strategy tried while extracting a file
#[derive(Debug, Clone)]
pub struct ParserAttempt {
    /// Parser/method name
    pub parser_name: String,
    /// Whether the attempt produced usable text
    pub success: bool,
    /// Error message if failed
    pub error: Option<String>,
    /// Number of characters extracted
    pub chars_extracted: usize,
    /// Duration of the attempt in milliseconds
    pub duration_ms: u64,
}

/// Outcome of running a format's fallback chain
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Extracted text (may be a diagnostic placeholder when `ok` is false)
    pub text: String,
    /// False when every tier was exhausted
    pub ok: bool,
    /// Method that produced `text`
    pub method: String,
    /// All attempts made, in order
    pub attempts: Vec<ParserAttempt>,
}

impl Extraction {
    pub fn success(text: String, method: impl Into<String>, attempts: Vec<ParserAttempt>) -> Self {
        Self {
            text,
            ok: true,
            method: method.into(),
            attempts,
        }
    }

    pub fn exhausted(text: String, attempts: Vec<ParserAttempt>) -> Self {
        Self {
            text,
            ok: false,
            method: "none".to_string(),
            attempts,
        }
    }

    /// Character count of the trimmed text
    pub fn significant_chars(&self) -> usize {
        self.text.trim().chars().count()
    }

    /// Short summary of failed attempts, used as the failure reason
    pub fn failure_summary(&self) -> String {
        let failed: Vec<String> = self
            .attempts
            .iter()
            .filter(|a| !a.success)
            .map(|a| match &a.error {
                Some(e) => format!("{}: {}", a.parser_name, e),
                None => a.parser_name.clone(),
            })
            .collect();

        if failed.is_empty() {
            "no significant text found".to_string()
        } else {
            format!("no significant text found ({})", failed.join("; "))
        }
    }
}

/// Records attempts as a fallback chain runs
#[derive(Debug, Default)]
pub struct AttemptLog {
    attempts: Vec<ParserAttempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tier. Text is accepted when its trimmed length reaches `min_chars`.
    pub fn run<F>(&mut self, filename: &str, name: &str, min_chars: usize, tier: F) -> Option<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let start = Instant::now();
        let result = tier();
        let duration_ms = start.elapsed().as_millis() as u64;

        let (accepted, chars, error) = match result {
            Ok(text) => {
                let chars = text.trim().chars().count();
                if chars >= min_chars {
                    (Some(text), chars, None)
                } else {
                    (None, chars, Some(format!("only {} characters", chars)))
                }
            }
            Err(e) => (None, 0, Some(e.to_string())),
        };

        match &error {
            None => tracing::debug!(
                "[{}] {} extracted {} chars in {}ms",
                filename,
                name,
                chars,
                duration_ms
            ),
            Some(e) => tracing::warn!("[{}] {} insufficient: {}", filename, name, e),
        }

        self.attempts.push(ParserAttempt {
            parser_name: name.to_string(),
            success: accepted.is_some(),
            error,
            chars_extracted: chars,
            duration_ms,
        });

        accepted
    }

    /// Fold attempts from a nested chain into this one
    pub fn extend(&mut self, other: Vec<ParserAttempt>) {
        self.attempts.extend(other);
    }

    pub fn into_attempts(self) -> Vec<ParserAttempt> {
        self.attempts
    }
}

/// Per-format extraction capability
pub trait FormatExtractor: Send + Sync {
    /// Name for logs
    fn name(&self) -> &'static str;

    /// Run the format's fallback chain. Never fails: exhaustion is `ok = false`.
    fn extract(&self, source: &SourceFile, config: &IngestConfig) -> Extraction;
}

static PDF: PdfExtractor = PdfExtractor;
static DOCX: DocxExtractor = DocxExtractor;
static LEGACY: LegacyDocReader = LegacyDocReader;
static TEXT: TextDecoder = TextDecoder;
static IMAGE: ImageExtractor = ImageExtractor;

/// Static dispatch from file type to extractor
pub fn extractor_for(file_type: FileType) -> Option<&'static dyn FormatExtractor> {
    match file_type {
        FileType::Pdf => Some(&PDF),
        FileType::Docx => Some(&DOCX),
        FileType::Doc => Some(&LEGACY),
        FileType::Txt => Some(&TEXT),
        FileType::Image => Some(&IMAGE),
        FileType::Unknown => None,
    }
}

/// Entry point for extracting text from a single source file
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    config: IngestConfig,
}

impl DocumentExtractor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Extract text from `source`.
    ///
    /// Only an unsupported extension is an error; every other problem is
    /// reported through [`Extraction::ok`].
    pub fn extract(&self, source: &SourceFile) -> Result<Extraction> {
        let extractor = extractor_for(source.file_type)
            .ok_or_else(|| Error::UnsupportedFileType(source.extension.clone()))?;

        tracing::info!(
            "[{}] Extracting with {} ({} bytes)",
            source.file_name,
            extractor.name(),
            source.size_bytes
        );

        let start = Instant::now();
        let extraction = extractor.extract(source, &self.config);

        tracing::debug!(
            "[{}] {} finished in {}ms via {} ({} attempts, ok={})",
            source.file_name,
            extractor.name(),
            start.elapsed().as_millis(),
            extraction.method,
            extraction.attempts.len(),
            extraction.ok
        );

        Ok(extraction)
    }
}

/// Raster images go straight to the OCR engine
pub struct ImageExtractor;

impl FormatExtractor for ImageExtractor {
    fn name(&self) -> &'static str {
        "image-ocr"
    }

    fn extract(&self, source: &SourceFile, config: &IngestConfig) -> Extraction {
        let engine = OcrEngine::new(config);
        let mut log = AttemptLog::new();

        let text = log.run(&source.file_name, "tesseract", 1, || {
            engine.recognize_checked(&source.path)
        });

        match text {
            Some(text) => Extraction::success(text, "tesseract", log.into_attempts()),
            None => Extraction::exhausted(String::new(), log.into_attempts()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        assert_eq!(extractor_for(FileType::Pdf).map(|e| e.name()), Some("pdf"));
        assert_eq!(extractor_for(FileType::Docx).map(|e| e.name()), Some("docx"));
        assert_eq!(extractor_for(FileType::Doc).map(|e| e.name()), Some("legacy-doc"));
        assert_eq!(extractor_for(FileType::Txt).map(|e| e.name()), Some("text"));
        assert_eq!(extractor_for(FileType::Image).map(|e| e.name()), Some("image-ocr"));
        assert!(extractor_for(FileType::Unknown).is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        std::fs::write(&path, b"PK").unwrap();

        let source = SourceFile::open(&path).unwrap();
        let err = DocumentExtractor::new(IngestConfig::default())
            .extract(&source)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(ext) if ext == "xlsx"));
    }

    #[test]
    fn test_attempt_log_threshold() {
        let mut log = AttemptLog::new();
        assert!(log.run("f", "short", 5, || Ok("abc".to_string())).is_none());
        assert!(log.run("f", "broken", 5, || Err(Error::internal("boom"))).is_none());
        assert_eq!(
            log.run("f", "good", 5, || Ok("  enough text ".to_string())),
            Some("  enough text ".to_string())
        );

        let attempts = log.into_attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].chars_extracted, 3);
        assert!(!attempts[1].success);
        assert!(attempts[2].success);

        let extraction = Extraction::exhausted(String::new(), attempts[..2].to_vec());
        let reason = extraction.failure_summary();
        assert!(reason.contains("short"));
        assert!(reason.contains("boom"));
    }
}
