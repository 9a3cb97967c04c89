//! Source file identity and format detection

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Old Microsoft Word document (.doc)
    Doc,
    /// Plain text file
    Txt,
    /// Raster image (for OCR)
    Image,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "doc" => Self::Doc,
            "txt" => Self::Txt,
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" | "gif" => Self::Image,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a path's extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get required tools for this file type
    pub fn required_tools(&self) -> Option<&str> {
        match self {
            Self::Doc => Some("antiword (apt install antiword)"),
            Self::Image => Some("tesseract OCR with fra/ara/eng data (apt install tesseract-ocr)"),
            Self::Pdf => Some("poppler-utils (pdftoppm) and tesseract for scanned PDFs"),
            _ => None,
        }
    }

    /// Every extension accepted by [`FileType::from_extension`]
    pub fn supported_extensions() -> &'static [&'static str] {
        &["pdf", "docx", "doc", "txt", "png", "jpg", "jpeg", "tiff", "tif", "bmp", "gif"]
    }
}

/// An input file, identified by its absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,
    /// File name including extension
    pub file_name: String,
    /// Lower-cased extension without the dot
    pub extension: String,
    /// Detected format
    pub file_type: FileType,
    /// Size in bytes
    pub size_bytes: u64,
}

impl SourceFile {
    /// Resolve `path` to an absolute path and read its metadata
    pub fn open(path: &Path) -> Result<Self> {
        let absolute = match std::fs::canonicalize(path) {
            Ok(absolute) => absolute,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = std::fs::metadata(&absolute)?;
        if !metadata.is_file() {
            return Err(Error::NotFound(absolute));
        }

        let file_name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = absolute
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let file_type = FileType::from_extension(&extension);

        Ok(Self {
            path: absolute,
            file_name,
            extension,
            file_type,
            size_bytes: metadata.len(),
        })
    }

    /// File name without its extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_name.clone())
    }

    /// Tag written to the artifact header (`PDF`, `TXT`, ...)
    pub fn type_tag(&self) -> String {
        self.extension.to_uppercase()
    }

    /// Absolute path as written to and compared against artifact headers
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
