//! Interactive selection walk.
//!
//! The walk is depth-first from the project root with entries in file-name
//! order. Every candidate goes through the [`PathFilter`] before it is
//! offered to the [`DecisionSource`] and again before a bulk add, so
//! filter exclusions hold whatever the answers are. Answers are final for
//! the run; the walk never revisits a directory.

use crate::error::Result;
use crate::filter::PathFilter;
use crate::record::SelectionRecord;

use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Answer for a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryDecision {
    /// Do not enter the directory.
    Skip,
    /// Include every eligible file beneath it without further questions.
    IncludeAll,
    /// Enter the directory and ask about each entry.
    AskEach,
}

/// Answer for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDecision {
    Include,
    Exclude,
}

/// Source of include/exclude answers: a human, a script, or a fixed policy.
///
/// Returning an error (e.g. [`PackError::Aborted`](crate::PackError::Aborted))
/// abandons the whole walk.
pub trait DecisionSource {
    fn ask_directory(&mut self, rel: &str) -> Result<DirectoryDecision>;
    fn ask_file(&mut self, rel: &str) -> Result<FileDecision>;
}

/// Includes everything the filter allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl DecisionSource for AcceptAll {
    fn ask_directory(&mut self, _rel: &str) -> Result<DirectoryDecision> {
        Ok(DirectoryDecision::IncludeAll)
    }

    fn ask_file(&mut self, _rel: &str) -> Result<FileDecision> {
        Ok(FileDecision::Include)
    }
}

/// Answers from fixed tables, with defaults for paths not listed.
/// Keeps the questions it was asked, in order.
#[derive(Debug, Clone)]
pub struct ScriptedDecisions {
    directories: HashMap<String, DirectoryDecision>,
    files: HashMap<String, FileDecision>,
    default_directory: DirectoryDecision,
    default_file: FileDecision,
    asked: Vec<String>,
}

impl ScriptedDecisions {
    pub fn new(default_directory: DirectoryDecision, default_file: FileDecision) -> Self {
        Self {
            directories: HashMap::new(),
            files: HashMap::new(),
            default_directory,
            default_file,
            asked: Vec::new(),
        }
    }

    pub fn directory(mut self, rel: &str, decision: DirectoryDecision) -> Self {
        self.directories.insert(rel.to_string(), decision);
        self
    }

    pub fn file(mut self, rel: &str, decision: FileDecision) -> Self {
        self.files.insert(rel.to_string(), decision);
        self
    }

    /// Paths asked about so far, in walk order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl DecisionSource for ScriptedDecisions {
    fn ask_directory(&mut self, rel: &str) -> Result<DirectoryDecision> {
        self.asked.push(rel.to_string());
        Ok(*self.directories.get(rel).unwrap_or(&self.default_directory))
    }

    fn ask_file(&mut self, rel: &str) -> Result<FileDecision> {
        self.asked.push(rel.to_string());
        Ok(*self.files.get(rel).unwrap_or(&self.default_file))
    }
}

/// A directory entry as seen by the walk.
struct Candidate {
    path: PathBuf,
    rel: String,
    is_dir: bool,
}

/// Walks a project tree and builds a [`SelectionRecord`].
pub struct Selector<'a> {
    root: PathBuf,
    filter: &'a PathFilter,
}

impl<'a> Selector<'a> {
    pub fn new(root: impl Into<PathBuf>, filter: &'a PathFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    /// Run the walk. Each call owns a fresh record; nothing is kept between runs.
    pub fn select(&self, source: &mut dyn DecisionSource) -> Result<SelectionRecord> {
        let mut record = SelectionRecord::default();
        self.walk_dir(&self.root, source, &mut record)?;
        Ok(record)
    }

    fn walk_dir(
        &self,
        dir: &Path,
        source: &mut dyn DecisionSource,
        record: &mut SelectionRecord,
    ) -> Result<()> {
        for candidate in self.list_dir(dir) {
            if let Some(reason) = self.filter.exclusion_reason(&candidate.rel, candidate.is_dir) {
                debug!("filtered {} ({})", candidate.rel, reason);
                record.filtered.push((candidate.rel, reason));
                continue;
            }

            if candidate.is_dir {
                match source.ask_directory(&candidate.rel)? {
                    DirectoryDecision::Skip => {
                        debug!("skipping directory {}", candidate.rel);
                        record.exclude_choices.insert(candidate.rel);
                    }
                    DirectoryDecision::IncludeAll => {
                        debug!("including all of {}", candidate.rel);
                        self.bulk_add(&candidate.path, record);
                        record.include_choices.insert(candidate.rel);
                    }
                    DirectoryDecision::AskEach => {
                        record.include_choices.insert(candidate.rel);
                        self.walk_dir(&candidate.path, source, record)?;
                    }
                }
            } else {
                match source.ask_file(&candidate.rel)? {
                    FileDecision::Include => {
                        record.included.push(candidate.rel.clone());
                        record.include_choices.insert(candidate.rel);
                    }
                    FileDecision::Exclude => {
                        record.exclude_choices.insert(candidate.rel);
                    }
                }
            }
        }
        Ok(())
    }

    /// Add every eligible file beneath `dir`, pruning excluded directories.
    fn bulk_add(&self, dir: &Path, record: &mut SelectionRecord) {
        let mut walker = walkdir::WalkDir::new(dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(result) = walker.next() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Failed to access entry under {}: {}", dir.display(), err);
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!("skipping symlink {}", entry.path().display());
                continue;
            }
            let Some(rel) = self.rel_of(entry.path()) else {
                continue;
            };

            if let Some(reason) = self.filter.exclusion_reason(&rel, file_type.is_dir()) {
                debug!("filtered {} ({})", rel, reason);
                if file_type.is_dir() {
                    walker.skip_current_dir();
                }
                record.filtered.push((rel, reason));
                continue;
            }

            if file_type.is_file() {
                record.included.push(rel);
            }
        }
    }

    /// Immediate children of `dir`, sorted by file name, symlinks dropped.
    fn list_dir(&self, dir: &Path) -> Vec<Candidate> {
        let walker = WalkBuilder::new(dir)
            .max_depth(Some(1))
            .hidden(false)
            .parents(false)
            // Ignore rules are applied by the path filter, not the walker.
            .git_ignore(false)
            .ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut candidates = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Failed to access entry in {}: {}", dir.display(), err);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                debug!("skipping symlink {}", entry.path().display());
                continue;
            }
            if let Some(rel) = self.rel_of(entry.path()) {
                candidates.push(Candidate {
                    path: entry.path().to_path_buf(),
                    rel,
                    is_dir: file_type.is_dir(),
                });
            }
        }
        candidates
    }

    fn rel_of(&self, path: &Path) -> Option<String> {
        let stripped = path.strip_prefix(&self.root).ok()?;
        let rel = stripped
            .components()
            .filter_map(|c| match c {
                Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        (!rel.is_empty()).then_some(rel)
    }
}
