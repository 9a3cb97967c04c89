//! Flat directory of `.txt` artifacts

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{artifact::body_of, Artifact, ArtifactHeader};

/// An artifact found in the output directory
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub header: ArtifactHeader,
}

/// Output directory holding one artifact per converted source
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Write `artifact` to `path` atomically.
    ///
    /// The content goes to a temp file in the output directory which is then
    /// renamed into place, so readers never see a partial artifact. An
    /// existing file at `path` is never replaced.
    pub fn write(&self, path: &Path, artifact: &Artifact) -> Result<()> {
        let wrap = |source: std::io::Error| Error::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        };

        self.ensure_dir().map_err(|e| match e {
            Error::Io(io) => wrap(io),
            other => other,
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(wrap)?;
        tmp.write_all(artifact.render().as_bytes()).map_err(wrap)?;
        tmp.as_file().sync_all().map_err(wrap)?;
        tmp.persist_noclobber(path).map_err(|e| wrap(e.error))?;

        tracing::debug!("Wrote artifact {}", path.display());
        Ok(())
    }

    /// All `.txt` artifacts, sorted by name. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<ArtifactEntry>> {
        let mut entries = Vec::new();
        for path in self.artifact_paths()? {
            let content = match std::fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => {
                    tracing::warn!("Cannot read {}: {}", path.display(), e);
                    continue;
                }
            };
            let size_bytes = content.len() as u64;
            entries.push(ArtifactEntry {
                name: file_name(&path),
                header: ArtifactHeader::parse(&content),
                path,
                size_bytes,
            });
        }
        Ok(entries)
    }

    /// Body of the named artifact, without its header
    pub fn read_body(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(Error::NotFound(path));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(body_of(&content).to_string())
    }

    /// Bodies of every artifact keyed by file name
    pub fn bodies(&self) -> Result<Vec<(String, String)>> {
        let mut bodies = Vec::new();
        for path in self.artifact_paths()? {
            let content = String::from_utf8_lossy(&std::fs::read(&path)?).to_string();
            bodies.push((file_name(&path), body_of(&content).to_string()));
        }
        Ok(bodies)
    }

    /// Delete every `.txt` artifact. Returns how many were removed.
    pub fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.artifact_paths()? {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Cannot remove {}: {}", path.display(), e),
            }
        }
        tracing::info!("Removed {} artifacts from {}", removed, self.dir.display());
        Ok(removed)
    }

    fn artifact_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().map(|e| e == "txt").unwrap_or(false))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceFile;

    fn artifact(dir: &Path, name: &str, body: &str) -> Artifact {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        Artifact::new(&SourceFile::open(&path).unwrap(), body.to_string())
    }

    #[test]
    fn test_write_and_list() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(output.path().join("results"));

        let first = artifact(input.path(), "b.pdf", "second by name");
        let second = artifact(input.path(), "a.pdf", "first by name");
        store.write(&store.dir().join("b.txt"), &first).unwrap();
        store.write(&store.dir().join("a.txt"), &second).unwrap();

        let listed = store.list().unwrap();
        let names: Vec<_> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(listed[0].header.source_file.as_deref(), Some("a.pdf"));
        assert_eq!(store.read_body("b.txt").unwrap(), "second by name");
        assert_eq!(
            store.bodies().unwrap(),
            vec![
                ("a.txt".to_string(), "first by name".to_string()),
                ("b.txt".to_string(), "second by name".to_string()),
            ]
        );

        // no temp files left behind
        let all = std::fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(all, 2);
    }

    #[test]
    fn test_write_never_overwrites() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(output.path());
        let target = output.path().join("a.txt");
        std::fs::write(&target, "existing").unwrap();

        let err = store
            .write(&target, &artifact(input.path(), "a.pdf", "new"))
            .unwrap_err();
        assert!(matches!(err, Error::ArtifactWrite { .. }));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "existing");
    }

    #[test]
    fn test_clean_only_removes_txt() {
        let output = tempfile::tempdir().unwrap();
        std::fs::write(output.path().join("a.txt"), "x").unwrap();
        std::fs::write(output.path().join("b.txt"), "y").unwrap();
        std::fs::write(output.path().join("keep.json"), "{}").unwrap();

        let store = ArtifactStore::new(output.path());
        assert_eq!(store.clean().unwrap(), 2);
        assert!(output.path().join("keep.json").exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let output = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(output.path().join("nope"));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.clean().unwrap(), 0);
        assert!(matches!(store.read_body("x.txt"), Err(Error::NotFound(_))));
    }
}
