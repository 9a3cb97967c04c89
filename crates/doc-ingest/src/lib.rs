//! doc-ingest: turn scanned images, PDFs, Word documents and text files into
//! plain-text artifacts with a provenance header.
//!
//! The [`IngestPipeline`] picks an extraction strategy per file, writes one
//! `.txt` artifact per source and skips sources that were already converted.
//! [`UploadWorkflow`] runs the same pipeline in the background and reports
//! progress through a [`JobTracker`].

pub mod config;
pub mod error;
pub mod ingestion;
pub mod ocr;
pub mod processing;
pub mod storage;
pub mod types;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use ingestion::{BatchReport, DocumentExtractor, Extraction, FileOutcome, IngestPipeline};
pub use ocr::{ImagePreprocessor, OcrEngine};
pub use processing::{Job, JobStatus, JobTracker, UploadWorkflow};
pub use storage::{ArtifactStore, ConflictDecision, ConflictResolver};
pub use types::{Artifact, ArtifactHeader, FileType, SourceFile};
