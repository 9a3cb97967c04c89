//! Ingestion orchestration: single files, directory batches, the output store

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::storage::{ArtifactEntry, ArtifactStore, ConflictDecision, ConflictResolver, MatchKind};
use crate::types::{Artifact, FileType, SourceFile};

use super::extractor::DocumentExtractor;

/// Extracted text must be longer than this (trimmed) to be written
pub const MIN_SIGNIFICANT_CHARS: usize = 10;

/// Successful result of ingesting one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// A new artifact was written
    Written {
        artifact: PathBuf,
        chars: usize,
        lines: usize,
        method: String,
        /// Written under a suffixed name because the candidate was taken
        alternative: bool,
    },
    /// An artifact for this source already exists
    Skipped {
        existing: PathBuf,
        match_kind: MatchKind,
    },
}

/// Per-file entry of a batch report
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Skipped by the pre-scan, without extraction
    pub pre_scan_skip: bool,
    pub outcome: std::result::Result<FileOutcome, String>,
}

/// A source the pre-scan found already converted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSkip {
    pub source: PathBuf,
    pub existing: PathBuf,
    pub match_kind: MatchKind,
}

/// Conflict pre-scan of a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchPlan {
    /// Already converted
    pub skipped: Vec<PlannedSkip>,
    /// Will be written under a suffixed name: (source, alternative name)
    pub renamed: Vec<(PathBuf, String)>,
    /// Will be written under the candidate name
    pub clean: Vec<PathBuf>,
}

impl BatchPlan {
    pub fn conflict_count(&self) -> usize {
        self.skipped.len() + self.renamed.len()
    }

    pub fn skip_for(&self, path: &Path) -> Option<&PlannedSkip> {
        self.skipped.iter().find(|skip| skip.source == path)
    }
}

/// Counters for a directory run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub found: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<FileReport>,
}

impl BatchReport {
    /// processed / (found - skipped), `None` when nothing was attempted
    pub fn success_rate(&self) -> Option<f64> {
        let attempted = self.found.saturating_sub(self.skipped);
        if attempted == 0 {
            None
        } else {
            Some(self.processed as f64 / attempted as f64)
        }
    }

    fn record(&mut self, report: FileReport) {
        match &report.outcome {
            Ok(_) if report.pre_scan_skip => self.skipped += 1,
            Ok(_) => self.processed += 1,
            Err(_) => self.failed += 1,
        }
        self.outcomes.push(report);
    }
}

/// Ingestion pipeline over one output directory
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    extractor: DocumentExtractor,
    resolver: ConflictResolver,
    store: ArtifactStore,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig) -> Self {
        let resolver = ConflictResolver::new(&config.output_dir, config.conflicts.clone());
        let store = ArtifactStore::new(&config.output_dir);
        Self {
            extractor: DocumentExtractor::new(config),
            resolver,
            store,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        self.extractor.config()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Ingest a single file
    pub fn process_file(&self, path: &Path) -> Result<FileOutcome> {
        let start = Instant::now();
        let source = SourceFile::open(path)?;
        let filename = source.file_name.clone();

        if !source.file_type.is_supported() {
            return Err(Error::UnsupportedFileType(format!(
                ".{} (supported: {})",
                source.extension,
                FileType::supported_extensions().join(", ")
            )));
        }

        let extraction = self.extractor.extract(&source)?;
        let chars = extraction.significant_chars();
        if !extraction.ok || chars <= MIN_SIGNIFICANT_CHARS {
            let reason = if !extraction.ok && !extraction.text.trim().is_empty() {
                extraction.text.trim().to_string()
            } else {
                extraction.failure_summary()
            };
            tracing::warn!("[{}] FAILED: {} ({} chars)", filename, reason, chars);
            return Err(Error::exhausted(filename, reason));
        }

        let (target, alternative) = match self.resolver.resolve(&source) {
            ConflictDecision::Skip {
                existing,
                match_kind,
            } => {
                tracing::info!("[{}] SKIPPED: already processed as {}", filename, existing.display());
                return Ok(FileOutcome::Skipped {
                    existing,
                    match_kind,
                });
            }
            ConflictDecision::Write(path) => (path, false),
            ConflictDecision::WriteAlternative { path, .. } => (path, true),
        };

        let body = extraction.text.trim().to_string();
        let lines = body.lines().count();
        let artifact = Artifact::new(&source, body);
        if let Err(e) = self.store.write(&target, &artifact) {
            tracing::error!("[{}] {}", filename, e);
            return Err(e);
        }

        tracing::info!(
            "[{}] SUCCESS via {}: {} chars, {} lines -> {} ({:.1}s)",
            filename,
            extraction.method,
            chars,
            lines,
            target.display(),
            start.elapsed().as_secs_f64()
        );

        Ok(FileOutcome::Written {
            artifact: target,
            chars: artifact.header.text_length.unwrap_or(chars),
            lines,
            method: extraction.method,
            alternative,
        })
    }

    /// Supported files under `path`, sorted by name. A single file is returned as-is.
    pub fn collect_inputs(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        if path.is_file() {
            return Ok(if FileType::from_path(path).is_supported() {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let output_dir = std::fs::canonicalize(self.store.dir()).ok();
        let root = std::fs::canonicalize(path)?;

        // A nested output dir is pruned from the walk. When the output dir is
        // the root (or above it) only recognised artifacts inside it are dropped.
        let (nested_output, shared_output) = match &output_dir {
            Some(out) if out != &root && out.starts_with(&root) => (Some(out.clone()), None),
            Some(out) if root.starts_with(out) => (None, Some(out.clone())),
            _ => (None, None),
        };

        let files = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match &nested_output {
                Some(out) => !entry.path().starts_with(out),
                None => true,
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| FileType::from_path(entry.path()).is_supported())
            .filter(|entry| match &shared_output {
                Some(out) => !self.is_own_artifact(entry.path(), out),
                None => true,
            })
            .map(|entry| entry.into_path())
            .collect();

        Ok(files)
    }

    /// A `.txt` directly in the output dir that carries a provenance header
    fn is_own_artifact(&self, path: &Path, output_dir: &Path) -> bool {
        path.parent() == Some(output_dir)
            && FileType::from_path(path) == FileType::Txt
            && self.resolver.read_header(path).is_some()
    }

    /// Pre-scan `files` for naming conflicts without extracting anything.
    ///
    /// Names chosen for earlier files in the batch are reserved, so two
    /// sources with the same stem are planned as `x.txt` and `x_1.txt`.
    pub fn analyze_conflicts(&self, files: &[PathBuf]) -> BatchPlan {
        let mut plan = BatchPlan::default();
        let mut reserved = HashSet::new();

        for path in files {
            let source = match SourceFile::open(path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::debug!("Cannot pre-scan {}: {}", path.display(), e);
                    plan.clean.push(path.clone());
                    continue;
                }
            };

            let decision = self.resolver.resolve_with_reserved(&source, &reserved);
            match decision {
                ConflictDecision::Skip {
                    existing,
                    match_kind,
                } => {
                    plan.skipped.push(PlannedSkip {
                        source: path.clone(),
                        existing,
                        match_kind,
                    });
                }
                ConflictDecision::Write(target) => {
                    reserved.insert(file_name(&target));
                    plan.clean.push(path.clone());
                }
                ConflictDecision::WriteAlternative { path: target, .. } => {
                    let name = file_name(&target);
                    reserved.insert(name.clone());
                    plan.renamed.push((path.clone(), name));
                }
            }
        }

        plan
    }

    /// Dry run: collect inputs under `path` and report the conflict plan
    pub fn check_conflicts(&self, path: &Path) -> Result<BatchPlan> {
        let files = self.collect_inputs(path)?;
        let plan = self.analyze_conflicts(&files);
        tracing::info!(
            "Conflict check of {} files: {} skipped, {} renamed, {} clean",
            files.len(),
            plan.skipped.len(),
            plan.renamed.len(),
            plan.clean.len()
        );
        Ok(plan)
    }

    /// Ingest every supported file under `dir`
    pub fn process_directory(&self, dir: &Path) -> Result<BatchReport> {
        self.process_directory_with(dir, |_, _| {})
    }

    /// Like [`IngestPipeline::process_directory`], calling `on_file` after each file
    pub fn process_directory_with<F>(&self, dir: &Path, mut on_file: F) -> Result<BatchReport>
    where
        F: FnMut(usize, &FileReport),
    {
        let files = self.collect_inputs(dir)?;
        let mut report = BatchReport {
            found: files.len(),
            ..BatchReport::default()
        };

        if files.is_empty() {
            tracing::info!("No supported files found in {}", dir.display());
            return Ok(report);
        }

        tracing::info!("Found {} supported files in {}", files.len(), dir.display());
        let plan = self.analyze_conflicts(&files);
        if plan.conflict_count() > 0 {
            tracing::info!(
                "Pre-scan: {} already processed, {} need alternative names",
                plan.skipped.len(),
                plan.renamed.len()
            );
        }

        for (index, path) in files.iter().enumerate() {
            let entry = if let Some(skip) = plan.skip_for(path) {
                tracing::info!("[{}] Skipping, already processed", display_name(path));
                FileReport {
                    path: path.clone(),
                    pre_scan_skip: true,
                    outcome: Ok(FileOutcome::Skipped {
                        existing: skip.existing.clone(),
                        match_kind: skip.match_kind,
                    }),
                }
            } else {
                FileReport {
                    path: path.clone(),
                    pre_scan_skip: false,
                    outcome: self.process_file(path).map_err(|e| e.to_string()),
                }
            };

            on_file(index, &entry);
            report.record(entry);
        }

        tracing::info!(
            "Batch done: {} found, {} processed, {} failed, {} skipped",
            report.found,
            report.processed,
            report.failed,
            report.skipped
        );
        Ok(report)
    }

    pub fn list_artifacts(&self) -> Result<Vec<ArtifactEntry>> {
        self.store.list()
    }

    pub fn clean_output(&self) -> Result<usize> {
        self.store.clean()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn display_name(path: &Path) -> String {
    let name = file_name(path);
    if name.is_empty() {
        path.display().to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(output: &Path) -> IngestPipeline {
        IngestPipeline::new(IngestConfig {
            output_dir: output.to_path_buf(),
            ..IngestConfig::default()
        })
    }

    #[test]
    fn test_success_rate() {
        let mut report = BatchReport {
            found: 4,
            processed: 2,
            failed: 1,
            skipped: 1,
            outcomes: Vec::new(),
        };
        assert!((report.success_rate().unwrap() - 2.0 / 3.0).abs() < 1e-9);

        report.skipped = 4;
        assert!(report.success_rate().is_none());
        assert!(BatchReport::default().success_rate().is_none());
    }

    #[test]
    fn test_threshold_boundary() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let pipeline = pipeline(output.path());

        let ten = input.path().join("ten.txt");
        std::fs::write(&ten, "  0123456789 \n").unwrap();
        let err = pipeline.process_file(&ten).unwrap_err();
        assert!(matches!(err, Error::ExtractionExhausted { .. }));

        let eleven = input.path().join("eleven.txt");
        std::fs::write(&eleven, "0123456789A").unwrap();
        let outcome = pipeline.process_file(&eleven).unwrap();
        assert!(matches!(outcome, FileOutcome::Written { chars: 11, lines: 1, .. }));
    }

    #[test]
    fn test_unsupported_and_missing() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let pipeline = pipeline(output.path());

        let sheet = input.path().join("budget.xlsx");
        std::fs::write(&sheet, b"PK").unwrap();
        assert!(matches!(
            pipeline.process_file(&sheet),
            Err(Error::UnsupportedFileType(_))
        ));
        assert!(matches!(
            pipeline.process_file(&input.path().join("gone.pdf")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_collect_inputs_sorted_and_filtered() {
        let input = tempfile::tempdir().unwrap();
        std::fs::create_dir(input.path().join("sub")).unwrap();
        for name in ["b.txt", "a.pdf", "sub/c.docx", "skip.xlsx", "README"] {
            std::fs::write(input.path().join(name), b"x").unwrap();
        }

        let output = input.path().join("results");
        std::fs::create_dir(&output).unwrap();
        std::fs::write(output.join("old.txt"), b"artifact").unwrap();

        let pipeline = pipeline(&output);
        let names: Vec<String> = pipeline
            .collect_inputs(input.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.txt", "c.docx"]);
    }

    #[test]
    fn test_directory_ingested_into_itself() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("memo.txt"),
            "Note interne sur le classement des dossiers.",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("lettre.txt"),
            "Lettre de relance pour pièces manquantes.",
        )
        .unwrap();

        let pipeline = pipeline(dir.path());
        let first = pipeline.process_directory(dir.path()).unwrap();
        assert_eq!(first.found, 2);
        assert_eq!(first.processed, 2, "outcomes: {:?}", first.outcomes);

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["lettre.txt", "lettre_1.txt", "memo.txt", "memo_1.txt"]);

        // artifacts sitting next to their sources are not inputs
        let second = pipeline.process_directory(dir.path()).unwrap();
        assert_eq!(second.found, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_output_above_input_keeps_sources() {
        let output = tempfile::tempdir().unwrap();
        let input = output.path().join("inbox");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("avis.txt"), "Avis de passage du facteur.").unwrap();

        let names: Vec<String> = pipeline(output.path())
            .collect_inputs(&input)
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["avis.txt"]);
    }

    #[test]
    fn test_report_and_plan_json() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("recu.txt");
        std::fs::write(&source, "Reçu de dépôt de dossier numéro 42.").unwrap();
        std::fs::write(input.path().join("vide.txt"), "").unwrap();

        let pipeline = pipeline(output.path());
        let report = pipeline.process_directory(input.path()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["found"], 2);
        assert_eq!(json["processed"], 1);
        assert_eq!(json["outcomes"][0]["outcome"]["Ok"]["outcome"], "written");
        assert_eq!(json["outcomes"][0]["outcome"]["Ok"]["method"], "text:utf-8");
        assert!(json["outcomes"][1]["outcome"]["Err"].is_string());

        let plan = serde_json::to_value(pipeline.check_conflicts(input.path()).unwrap()).unwrap();
        assert_eq!(plan["skipped"][0]["match_kind"], "path_and_name");
        assert_eq!(plan["clean"].as_array().unwrap().len(), 1);

        let listed = serde_json::to_value(pipeline.list_artifacts().unwrap()).unwrap();
        assert_eq!(listed[0]["name"], "recu.txt");
        assert_eq!(listed[0]["header"]["source_file"], "recu.txt");
        assert_eq!(listed[0]["header"]["file_type"], "TXT");
    }

    #[test]
    fn test_plan_reserves_names() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = ["a.docx", "a.pdf", "b.txt"]
            .iter()
            .map(|name| {
                let path = input.path().join(name);
                std::fs::write(&path, b"x").unwrap();
                path
            })
            .collect();

        let plan = pipeline(output.path()).analyze_conflicts(&files);
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.renamed, vec![(files[1].clone(), "a_1.txt".to_string())]);
        assert_eq!(plan.clean, vec![files[0].clone(), files[2].clone()]);
        assert_eq!(plan.conflict_count(), 1);
    }
}
