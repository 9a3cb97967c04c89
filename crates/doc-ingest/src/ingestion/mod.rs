//! Document ingestion pipeline with multi-format extraction

pub mod docx;
mod extractor;
pub mod legacy;
pub mod pdf;
mod processor;
pub mod text;
pub mod tools;

pub use extractor::{
    extractor_for, AttemptLog, DocumentExtractor, Extraction, FormatExtractor, ImageExtractor,
    ParserAttempt,
};
pub use legacy::LegacyDocReader;
pub use processor::{
    BatchPlan, BatchReport, FileOutcome, FileReport, IngestPipeline, PlannedSkip,
    MIN_SIGNIFICANT_CHARS,
};
pub use text::{DecodedText, TextDecoder};
