//! Legacy binary Word documents (`.doc`)
//!
//! There is no native parser for the old binary format. The chain is:
//! structured parser (catches renamed `.docx`), external converter, a scan
//! of the raw bytes for readable runs, and finally a diagnostic placeholder.

use std::process::Command;
use std::sync::OnceLock;

use encoding_rs::{UTF_16LE, WINDOWS_1252};
use regex::Regex;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::ingestion::docx::try_structured;
use crate::ingestion::extractor::{AttemptLog, Extraction, FormatExtractor};
use crate::ingestion::tools;
use crate::types::SourceFile;

/// Runs of at least ten "text-looking" characters
const READABLE_RUN: &str = r"[a-zA-ZÀ-ÿ0-9\s.,;:!?\-()]{10,}";

fn readable_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(READABLE_RUN).expect("Invalid regex"))
}

pub struct LegacyDocReader;

impl LegacyDocReader {
    /// Converter, byte scan, placeholder. Attempts are appended to `log`.
    pub fn read_legacy(source: &SourceFile, config: &IngestConfig, mut log: AttemptLog) -> Extraction {
        let filename = source.file_name.as_str();
        // a tier must produce strictly more than `min_text_chars`
        let min_chars = config.legacy.min_text_chars + 1;
        let converter = config.legacy.converter.as_str();

        tracing::info!("[{}] Attempting legacy .doc extraction", filename);

        if let Some(text) = log.run(filename, converter, min_chars, || {
            convert(source, config)
        }) {
            return Extraction::success(text.trim().to_string(), converter, log.into_attempts());
        }

        if let Some(text) = log.run(filename, "binary-scan", min_chars, || {
            let data = std::fs::read(&source.path)?;
            Ok(scan_readable_text(&data))
        }) {
            return Extraction::success(text, "binary-scan", log.into_attempts());
        }

        tracing::warn!("[{}] Legacy .doc could not be read", filename);
        Extraction::exhausted(placeholder(filename), log.into_attempts())
    }
}

impl FormatExtractor for LegacyDocReader {
    fn name(&self) -> &'static str {
        "legacy-doc"
    }

    fn extract(&self, source: &SourceFile, config: &IngestConfig) -> Extraction {
        let mut log = AttemptLog::new();
        if let Some(text) = try_structured(source, &mut log) {
            tracing::info!("[{}] .doc file is really a .docx", source.file_name);
            return Extraction::success(text, "docx-rs", log.into_attempts());
        }
        Self::read_legacy(source, config, log)
    }
}

fn convert(source: &SourceFile, config: &IngestConfig) -> Result<String> {
    let mut command = Command::new(&config.legacy.converter);
    command.arg(&source.path);
    let output = tools::run_checked(&mut command, &config.legacy.converter, config.legacy.timeout())?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Decode the raw bytes several ways, keep readable runs from each, and
/// join them with whitespace collapsed.
pub fn scan_readable_text(data: &[u8]) -> String {
    let decodings = [
        String::from_utf8_lossy(data).to_string(),
        data.iter().map(|&b| b as char).collect::<String>(),
        WINDOWS_1252.decode_without_bom_handling(data).0.to_string(),
        UTF_16LE.decode(data).0.to_string(),
    ];

    let mut parts = Vec::new();
    for decoded in &decodings {
        // undecodable bytes are dropped rather than replaced
        let decoded: String = decoded.chars().filter(|&c| c != '\u{FFFD}').collect();
        parts.extend(readable_run().find_iter(&decoded).map(|m| m.as_str().to_string()));
    }

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Diagnostic text returned when every tier failed
pub fn placeholder(filename: &str) -> String {
    format!(
        "Legacy .doc file detected. Please convert to .docx or PDF format for better text extraction. File: {}",
        filename
    )
}
