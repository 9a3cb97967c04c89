//! Artifact naming and duplicate detection
//!
//! The provenance header of an existing artifact decides whether a source has
//! already been converted. Same-stem files from different sources get `_1`,
//! `_2`, ... suffixes. Siblings are probed for a matching header too, so
//! re-running a batch that produced suffixed names converts nothing twice.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ConflictConfig;
use crate::types::{sanitize_stem, ArtifactHeader, SourceFile};

/// How an existing artifact was matched to the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Both `Source File` and `File Path` match
    PathAndName,
    /// Only `Source File` matches; the header has no `File Path`
    NameOnly,
}

/// What to do with a source file's artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Already converted
    Skip { existing: PathBuf, match_kind: MatchKind },
    /// Candidate name is free
    Write(PathBuf),
    /// Candidate name is taken by another source; write under a suffixed name
    WriteAlternative {
        path: PathBuf,
        existing_source: Option<String>,
    },
}

impl ConflictDecision {
    /// Path that will be written, or the artifact that caused the skip
    pub fn path(&self) -> &Path {
        match self {
            Self::Skip { existing, .. } => existing,
            Self::Write(path) => path,
            Self::WriteAlternative { path, .. } => path,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }

    /// File name of [`ConflictDecision::path`]
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Decides where a source's artifact goes
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    output_dir: PathBuf,
    config: ConflictConfig,
}

impl ConflictResolver {
    pub fn new(output_dir: impl Into<PathBuf>, config: ConflictConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            config,
        }
    }

    /// `<sanitized stem>.txt`
    pub fn candidate_name(source: &SourceFile) -> String {
        format!("{}.txt", sanitize_stem(&source.stem()))
    }

    /// Decide against what is currently on disk
    pub fn resolve(&self, source: &SourceFile) -> ConflictDecision {
        self.resolve_with_reserved(source, &HashSet::new())
    }

    /// Decide against what is on disk plus `reserved` names claimed earlier
    /// in the same batch. Reserved names count as taken by another source.
    pub fn resolve_with_reserved(
        &self,
        source: &SourceFile,
        reserved: &HashSet<String>,
    ) -> ConflictDecision {
        let base = sanitize_stem(&source.stem());
        let mut existing_source: Option<String> = None;
        let mut n = 0usize;

        loop {
            let name = if n == 0 {
                format!("{}.txt", base)
            } else {
                format!("{}_{}.txt", base, n)
            };
            let path = self.output_dir.join(&name);

            if reserved.contains(&name) {
                tracing::debug!("[{}] {} reserved earlier in this batch", source.file_name, name);
            } else if !path.exists() {
                return if n == 0 {
                    ConflictDecision::Write(path)
                } else {
                    tracing::info!(
                        "[{}] Name conflict, using alternative {}",
                        source.file_name,
                        name
                    );
                    ConflictDecision::WriteAlternative {
                        path,
                        existing_source,
                    }
                };
            } else if let Some(header) = self.read_header(&path) {
                if let Some(match_kind) = self.same_source(&header, source) {
                    tracing::debug!("[{}] Already converted to {}", source.file_name, name);
                    return ConflictDecision::Skip {
                        existing: path,
                        match_kind,
                    };
                }
                if existing_source.is_none() {
                    existing_source = header.source_file;
                }
            } else {
                tracing::debug!("[{}] {} has no readable header", source.file_name, name);
            }

            n += 1;
        }
    }

    /// Parse the header of an existing artifact. `None` when unreadable or headerless.
    pub fn read_header(&self, path: &Path) -> Option<ArtifactHeader> {
        let file = File::open(path).ok()?;
        let mut buf = Vec::with_capacity(self.config.header_probe_bytes);
        file.take(self.config.header_probe_bytes as u64)
            .read_to_end(&mut buf)
            .ok()?;

        let header = ArtifactHeader::parse(&String::from_utf8_lossy(&buf));
        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    /// Whether `header` names `source`
    pub fn same_source(&self, header: &ArtifactHeader, source: &SourceFile) -> Option<MatchKind> {
        if header.source_file.as_deref() != Some(source.file_name.as_str()) {
            return None;
        }

        match header.file_path.as_deref() {
            Some(path) if path == source.path_string() => Some(MatchKind::PathAndName),
            Some(_) => None,
            None if self.config.allow_name_only_match => {
                tracing::warn!(
                    "[{}] Matched existing artifact by file name only (no File Path in header)",
                    source.file_name
                );
                Some(MatchKind::NameOnly)
            }
            None => None,
        }
    }
}
