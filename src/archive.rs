//! Artifact model and builder.
//!
//! An artifact is a single JSON document holding the ordered file list, one
//! base64 payload per file and a tree description derived from the list. It
//! never contains the mapping specification, so a redacted artifact can be
//! shared without the values it replaced.

use crate::error::{PackError, Result};
use crate::mapping::MappingResolver;
use crate::paths::join_rel;
use crate::tree;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Format tag written into every artifact.
pub const ARTIFACT_FORMAT: &str = "portpack/1";

/// One packaged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    /// Base64 of the (possibly substituted) file bytes.
    pub payload: String,
}

impl ArtifactEntry {
    pub fn encode(path: impl Into<String>, content: &[u8]) -> Self {
        Self {
            path: path.into(),
            payload: STANDARD.encode(content),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|err| PackError::ArtifactFormat(format!("payload of {}: {}", self.path, err)))
    }
}

/// A self-contained package of files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub format: String,
    pub project: String,
    /// RFC 3339 creation time.
    pub created: String,
    pub files: Vec<ArtifactEntry>,
    /// Directory tree implied by `files`.
    pub tree: String,
}

impl Artifact {
    pub fn new(project: impl Into<String>, created: impl Into<String>, files: Vec<ArtifactEntry>) -> Self {
        let tree = tree::describe(&files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>());
        Self {
            format: ARTIFACT_FORMAT.to_string(),
            project: project.into(),
            created: created.into(),
            files,
            tree,
        }
    }

    /// Paths in packaging order.
    pub fn file_list(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }

    /// Recompute the tree description from the file list.
    pub fn tree_description(&self) -> String {
        tree::describe(&self.file_list())
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: Artifact =
            serde_json::from_str(content).map_err(|err| PackError::ArtifactFormat(err.to_string()))?;
        if artifact.format != ARTIFACT_FORMAT {
            return Err(PackError::ArtifactFormat(format!(
                "unsupported format '{}', expected '{}'",
                artifact.format, ARTIFACT_FORMAT
            )));
        }
        Ok(artifact)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| PackError::io(path, err))?;
        Self::from_json(&content)
    }

    /// Write the artifact atomically: a temporary file in the destination
    /// directory is renamed into place only once it is complete.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| PackError::ArtifactFormat(err.to_string()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|err| PackError::io(&dir, err))?;
        temp.write_all(json.as_bytes())
            .map_err(|err| PackError::io(temp.path(), err))?;
        temp.persist(path)
            .map_err(|err| PackError::io(path, err.error))?;
        Ok(())
    }
}

/// A file that could not be packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub path: String,
    pub error: String,
}

/// Result of a build: the artifact plus per-file failures.
#[derive(Debug)]
pub struct BuildOutcome {
    pub artifact: Artifact,
    pub failures: Vec<BuildFailure>,
    /// Total size of the packaged files before encoding.
    pub total_bytes: u64,
}

/// Serializes selected files into an [`Artifact`].
pub struct ArchiveBuilder<'a> {
    root: PathBuf,
    project: String,
    mapping: Option<&'a MappingResolver>,
    progress: bool,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(root: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            project: project.into(),
            mapping: None,
            progress: false,
        }
    }

    /// Apply forward substitutions from `mapping` to every file.
    pub fn with_mapping(mut self, mapping: Option<&'a MappingResolver>) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Package `files` (root-relative, in selection order).
    ///
    /// Files are read and encoded in parallel; the artifact keeps the input
    /// order. Unreadable files are reported in `failures` and left out.
    pub fn build(&self, files: &[String], created: &str) -> BuildOutcome {
        let progress = if self.progress {
            let bar = ProgressBar::new(files.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
            {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let results: Vec<(String, std::result::Result<Vec<u8>, String>)> = files
            .par_iter()
            .map(|rel| {
                let result = self.package_file(rel);
                progress.inc(1);
                (rel.clone(), result)
            })
            .collect();

        let mut entries = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        let mut total_bytes = 0u64;
        for (path, result) in results {
            match result {
                Ok(content) => {
                    total_bytes += content.len() as u64;
                    entries.push(ArtifactEntry::encode(path, &content));
                }
                Err(error) => {
                    warn!("Failed to package {}: {}", path, error);
                    failures.push(BuildFailure { path, error });
                }
            }
        }
        progress.finish_and_clear();

        BuildOutcome {
            artifact: Artifact::new(self.project.clone(), created, entries),
            failures,
            total_bytes,
        }
    }

    fn package_file(&self, rel: &str) -> std::result::Result<Vec<u8>, String> {
        let path = join_rel(&self.root, rel);
        let content = fs::read(&path).map_err(|err| err.to_string())?;
        match self.mapping {
            Some(mapping) => {
                let rules = mapping.forward_rules(rel);
                if rules.is_empty() {
                    Ok(content)
                } else {
                    debug!("applying {} substitutions to {}", rules.rules().len(), rel);
                    Ok(rules.apply(&content))
                }
            }
            None => Ok(content),
        }
    }
}
