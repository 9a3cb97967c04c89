//! Error types for the ingestion pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input path does not exist
    #[error("Path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    /// Extension is not in the supported table
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Every fallback tier for the format produced insufficient content
    #[error("No significant text extracted from '{filename}': {reason}")]
    ExtractionExhausted { filename: String, reason: String },

    /// External converter / OCR tool failed or timed out
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    /// Artifact could not be persisted
    #[error("Failed to write artifact {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Job id unknown to the tracker
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction-exhausted error
    pub fn exhausted(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExtractionExhausted {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Create an external tool error
    pub fn external_tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
