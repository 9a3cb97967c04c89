//! Configuration for the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory that receives the extracted `.txt` artifacts
    pub output_dir: PathBuf,
    /// Parent directory for scratch files (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    /// PDF extraction configuration
    pub pdf: PdfConfig,
    /// OCR engine configuration
    pub ocr: OcrConfig,
    /// Legacy `.doc` reader configuration
    pub legacy: LegacyConfig,
    /// Conflict resolution configuration
    pub conflicts: ConflictConfig,
    /// Background job configuration
    pub jobs: JobConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./ocr_results"),
            temp_dir: None,
            pdf: PdfConfig::default(),
            ocr: OcrConfig::default(),
            legacy: LegacyConfig::default(),
            conflicts: ConflictConfig::default(),
            jobs: JobConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Per-user config location (`<config dir>/doc-ingest/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("doc-ingest").join("config.toml"))
    }

    /// Explicit path if given, else the per-user file if it exists, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Directory under which scoped temp dirs are created
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// PDF extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Text-layer output below this many characters falls through to the next tier
    pub min_text_chars: usize,
    /// Rasterization resolution for the OCR fallback
    pub render_dpi: u32,
    /// Rasterizer binary (poppler-utils)
    pub rasterizer: String,
    /// Timeout for the primary text-layer library (seconds)
    pub text_layer_timeout_secs: u64,
    /// Timeout for page rasterization (seconds)
    pub render_timeout_secs: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            render_dpi: 300,
            rasterizer: "pdftoppm".to_string(),
            text_layer_timeout_secs: 60,
            render_timeout_secs: 120,
        }
    }
}

impl PdfConfig {
    pub fn text_layer_timeout(&self) -> Duration {
        Duration::from_secs(self.text_layer_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

/// OCR engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Engine binary
    pub binary: String,
    /// Active languages, joined with `+` (French, Arabic, English by default)
    pub languages: String,
    /// Tesseract `--oem`
    pub engine_mode: u8,
    /// Tesseract `--psm`
    pub page_seg_mode: u8,
    /// Run the preprocessing filter chain before recognition
    pub preprocess: bool,
    /// Timeout per image (seconds)
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            languages: "fra+ara+eng".to_string(),
            engine_mode: 3,
            page_seg_mode: 6,
            preprocess: true,
            timeout_secs: 120,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Legacy `.doc` reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    /// Command-line converter
    pub converter: String,
    /// Converter timeout (seconds)
    pub timeout_secs: u64,
    /// A tier's output must be longer than this to be accepted
    pub min_text_chars: usize,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            converter: "antiword".to_string(),
            timeout_secs: 30,
            min_text_chars: 10,
        }
    }
}

impl LegacyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Conflict resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Treat a matching `Source File` as the same source when the header has no `File Path`
    pub allow_name_only_match: bool,
    /// How much of an existing artifact is read to find its header
    pub header_probe_bytes: usize,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            allow_name_only_match: true,
            header_probe_bytes: 1000,
        }
    }
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Concurrent ingestion jobs (default: CPU count, max 8)
    pub parallel_jobs: Option<usize>,
    /// Timeout for a single file ingestion (seconds)
    pub file_timeout_secs: u64,
    /// Finished jobs older than this are evicted from the tracker (seconds)
    pub retention_secs: u64,
    /// Remove the uploaded source once its artifact is written
    pub delete_source_on_success: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            parallel_jobs: None,
            file_timeout_secs: 300, // 5 minutes
            retention_secs: 24 * 60 * 60,
            delete_source_on_success: true,
        }
    }
}

impl JobConfig {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn worker_count(&self) -> usize {
        self.parallel_jobs
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.pdf.min_text_chars, 50);
        assert_eq!(config.pdf.render_dpi, 300);
        assert_eq!(config.ocr.languages, "fra+ara+eng");
        assert_eq!(config.legacy.min_text_chars, 10);
        assert!(config.conflicts.allow_name_only_match);
    }

    #[test]
    fn test_partial_toml() {
        let config = IngestConfig::from_toml_str(
            r#"
output_dir = "/srv/artifacts"

[ocr]
languages = "eng"

[jobs]
parallel_jobs = 2
"#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/srv/artifacts"));
        assert_eq!(config.ocr.languages, "eng");
        assert_eq!(config.ocr.page_seg_mode, 6);
        assert_eq!(config.jobs.worker_count(), 2);
        assert_eq!(config.pdf.rasterizer, "pdftoppm");
    }

    #[test]
    fn test_invalid_toml() {
        let err = IngestConfig::from_toml_str("output_dir = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
