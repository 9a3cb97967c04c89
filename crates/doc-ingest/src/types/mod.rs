//! Core types for the ingestion pipeline

pub mod artifact;
pub mod document;

pub use artifact::{Artifact, ArtifactHeader};
pub use document::{sanitize_stem, FileType, SourceFile};
