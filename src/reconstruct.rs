//! Rebuilding a file tree from an artifact.

use crate::archive::Artifact;
use crate::error::{PackError, Result};
use crate::mapping::{Ambiguity, MappingResolver};
use crate::paths::{ancestors, is_safe_rel, join_rel};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Answer to "overwrite this existing file?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    Yes,
    No,
    /// Yes, and do not ask again for the rest of the run.
    All,
}

/// Decides what happens when a destination file already exists.
pub trait OverwritePolicy {
    fn confirm(&mut self, rel: &str) -> Result<OverwriteDecision>;
}

/// Overwrite every existing file.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteAll;

impl OverwritePolicy for OverwriteAll {
    fn confirm(&mut self, _rel: &str) -> Result<OverwriteDecision> {
        Ok(OverwriteDecision::All)
    }
}

/// Keep every existing file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverOverwrite;

impl OverwritePolicy for NeverOverwrite {
    fn confirm(&mut self, _rel: &str) -> Result<OverwriteDecision> {
        Ok(OverwriteDecision::No)
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written,
    /// The destination existed and overwriting was declined.
    Skipped,
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written => f.write_str("written"),
            Self::Skipped => f.write_str("skipped (exists)"),
            Self::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: String,
    pub outcome: Outcome,
}

/// Per-file results of a reconstruction, in artifact order.
#[derive(Debug, Clone, Default)]
pub struct ReconstructReport {
    pub files: Vec<FileReport>,
    /// Ambiguous placeholders met while inverting, by file.
    pub ambiguities: Vec<(String, Ambiguity)>,
}

impl ReconstructReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|o| *o == Outcome::Written)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == Outcome::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn outcome_of(&self, rel: &str) -> Option<&Outcome> {
        self.files.iter().find(|f| f.path == rel).map(|f| &f.outcome)
    }
}

/// Writes an artifact's files under a target directory.
pub struct ArchiveReconstructor<'a> {
    target: PathBuf,
    mapping: Option<&'a MappingResolver>,
}

impl<'a> ArchiveReconstructor<'a> {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            mapping: None,
        }
    }

    /// Reverse substitutions with the original mapping specification.
    pub fn with_mapping(mut self, mapping: Option<&'a MappingResolver>) -> Self {
        self.mapping = mapping;
        self
    }

    /// Reconstruct every file in artifact order.
    ///
    /// All entry paths are validated before anything is written; an entry
    /// that would escape the target aborts the whole run. Per-file decode and
    /// write failures are reported and the run continues.
    pub fn reconstruct(
        &self,
        artifact: &Artifact,
        policy: &mut dyn OverwritePolicy,
    ) -> Result<ReconstructReport> {
        if let Some(entry) = artifact.files.iter().find(|f| !is_safe_rel(&f.path)) {
            return Err(PackError::UnsafePath(entry.path.clone()));
        }

        let mut report = ReconstructReport::default();
        let mut overwrite_all = false;

        for entry in &artifact.files {
            let destination = join_rel(&self.target, &entry.path);

            if let Err(err) = refuse_symlinks(&self.target, &entry.path) {
                warn!("{}", err);
                report.files.push(FileReport {
                    path: entry.path.clone(),
                    outcome: Outcome::Failed(err.to_string()),
                });
                continue;
            }

            if destination.exists() && !overwrite_all {
                match policy.confirm(&entry.path)? {
                    OverwriteDecision::Yes => {}
                    OverwriteDecision::All => overwrite_all = true,
                    OverwriteDecision::No => {
                        debug!("keeping existing {}", destination.display());
                        report.files.push(FileReport {
                            path: entry.path.clone(),
                            outcome: Outcome::Skipped,
                        });
                        continue;
                    }
                }
            }

            let content = match entry.decode() {
                Ok(content) => content,
                Err(err) => {
                    warn!("{}", err);
                    report.files.push(FileReport {
                        path: entry.path.clone(),
                        outcome: Outcome::Failed(err.to_string()),
                    });
                    continue;
                }
            };

            let content = match self.mapping {
                Some(mapping) => {
                    let inverse = mapping.inverse_rules(&entry.path);
                    for ambiguity in inverse.ambiguities {
                        warn!(
                            "{}: placeholder '{}' stands for several values; restoring '{}', cannot restore {:?}",
                            entry.path, ambiguity.placeholder, ambiguity.kept, ambiguity.dropped
                        );
                        report.ambiguities.push((entry.path.clone(), ambiguity));
                    }
                    inverse.rules.apply(&content)
                }
                None => content,
            };

            let outcome = match write_file(&destination, &content) {
                Ok(()) => Outcome::Written,
                Err(err) => {
                    warn!("{}", err);
                    Outcome::Failed(err.to_string())
                }
            };
            report.files.push(FileReport {
                path: entry.path.clone(),
                outcome,
            });
        }

        Ok(report)
    }
}

/// Fail when the destination, or any directory between it and `target`,
/// is an existing symlink that could redirect the write.
fn refuse_symlinks(target: &Path, rel: &str) -> Result<()> {
    for part in ancestors(rel).chain(std::iter::once(rel)) {
        let path = join_rel(target, part);
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(PackError::UnsafePath(format!("{} (symlink at {})", rel, part)));
            }
            Ok(_) => {}
            // Nothing further down can exist either.
            Err(_) => break,
        }
    }
    Ok(())
}

fn write_file(destination: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| PackError::io(parent, err))?;
    }
    fs::write(destination, content).map_err(|err| PackError::io(destination, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArtifactEntry;

    fn artifact(files: &[(&str, &str)]) -> Artifact {
        Artifact::new(
            "demo",
            "now",
            files
                .iter()
                .map(|(path, content)| ArtifactEntry::encode(*path, content.as_bytes()))
                .collect(),
        )
    }

    fn mapping(json: &str) -> MappingResolver {
        MappingResolver::parse(json, Path::new("map.json")).unwrap()
    }

    #[test]
    fn test_reconstruct_without_mapping_is_verbatim() {
        let target = tempfile::tempdir().unwrap();
        let art = artifact(&[("a/b/c.txt", "ANON here"), ("top.txt", "top")]);
        let report = ArchiveReconstructor::new(target.path())
            .reconstruct(&art, &mut NeverOverwrite)
            .unwrap();

        assert_eq!(report.written(), 2);
        assert_eq!(fs::read_to_string(target.path().join("a/b/c.txt")).unwrap(), "ANON here");
        assert_eq!(fs::read_to_string(target.path().join("top.txt")).unwrap(), "top");
    }

    #[test]
    fn test_reconstruct_with_mapping_restores_values() {
        let target = tempfile::tempdir().unwrap();
        let m = mapping(r#"{"map":[{"scope":".","list":[{"Acme":"ANON"}]}]}"#);
        let art = artifact(&[("notes.txt", "ANONANON")]);
        let report = ArchiveReconstructor::new(target.path())
            .with_mapping(Some(&m))
            .reconstruct(&art, &mut NeverOverwrite)
            .unwrap();

        assert!(report.ambiguities.is_empty());
        assert_eq!(fs::read_to_string(target.path().join("notes.txt")).unwrap(), "AcmeAcme");
    }

    #[test]
    fn test_existing_file_declined_is_reported() {
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("keep.txt"), "original").unwrap();
        let art = artifact(&[("keep.txt", "replacement"), ("new.txt", "new")]);
        let report = ArchiveReconstructor::new(target.path())
            .reconstruct(&art, &mut NeverOverwrite)
            .unwrap();

        assert_eq!(report.outcome_of("keep.txt"), Some(&Outcome::Skipped));
        assert_eq!(report.outcome_of("new.txt"), Some(&Outcome::Written));
        assert_eq!(report.skipped(), 1);
        assert_eq!(fs::read_to_string(target.path().join("keep.txt")).unwrap(), "original");
    }

    #[test]
    fn test_yes_to_all_stops_asking() {
        struct CountingAll(usize);
        impl OverwritePolicy for CountingAll {
            fn confirm(&mut self, _rel: &str) -> Result<OverwriteDecision> {
                self.0 += 1;
                Ok(OverwriteDecision::All)
            }
        }

        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("a.txt"), "old").unwrap();
        fs::write(target.path().join("b.txt"), "old").unwrap();
        let art = artifact(&[("a.txt", "new a"), ("b.txt", "new b")]);
        let mut policy = CountingAll(0);
        let report = ArchiveReconstructor::new(target.path())
            .reconstruct(&art, &mut policy)
            .unwrap();

        assert_eq!(policy.0, 1);
        assert_eq!(report.written(), 2);
        assert_eq!(fs::read_to_string(target.path().join("b.txt")).unwrap(), "new b");
    }

    #[test]
    fn test_unsafe_path_aborts_before_writing() {
        let target = tempfile::tempdir().unwrap();
        let art = artifact(&[("fine.txt", "x"), ("../escape.txt", "y")]);
        let result = ArchiveReconstructor::new(target.path()).reconstruct(&art, &mut OverwriteAll);

        assert!(matches!(result, Err(PackError::UnsafePath(p)) if p == "../escape.txt"));
        assert!(!target.path().join("fine.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_in_target_is_not_followed() {
        let target = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), target.path().join("link")).unwrap();
        let art = artifact(&[("link/x.txt", "payload"), ("plain.txt", "ok")]);
        let report = ArchiveReconstructor::new(target.path())
            .reconstruct(&art, &mut OverwriteAll)
            .unwrap();

        assert!(matches!(report.outcome_of("link/x.txt"), Some(Outcome::Failed(_))));
        assert_eq!(report.outcome_of("plain.txt"), Some(&Outcome::Written));
        assert!(!outside.path().join("x.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_in_target_is_not_overwritten() {
        let target = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let victim = outside.path().join("victim.txt");
        fs::write(&victim, "untouched").unwrap();
        std::os::unix::fs::symlink(&victim, target.path().join("a.txt")).unwrap();
        let art = artifact(&[("a.txt", "overwritten")]);
        let report = ArchiveReconstructor::new(target.path())
            .reconstruct(&art, &mut OverwriteAll)
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(fs::read_to_string(&victim).unwrap(), "untouched");
    }

    #[test]
    fn test_bad_payload_is_a_per_file_failure() {
        let target = tempfile::tempdir().unwrap();
        let mut art = artifact(&[("bad.txt", "x"), ("good.txt", "y")]);
        art.files[0].payload = "not base64!".to_string();
        let report = ArchiveReconstructor::new(target.path())
            .reconstruct(&art, &mut OverwriteAll)
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.written(), 1);
        assert!(matches!(report.outcome_of("bad.txt"), Some(Outcome::Failed(_))));
    }

    #[test]
    fn test_ambiguous_placeholders_are_reported() {
        let target = tempfile::tempdir().unwrap();
        let m = mapping(r#"{"map":[{"list":[{"alpha":"X"},{"beta":"X"}]}]}"#);
        let art = artifact(&[("f.txt", "X and X")]);
        let report = ArchiveReconstructor::new(target.path())
            .with_mapping(Some(&m))
            .reconstruct(&art, &mut OverwriteAll)
            .unwrap();

        assert_eq!(report.ambiguities.len(), 1);
        assert_eq!(report.ambiguities[0].1.placeholder, "X");
        assert_eq!(fs::read_to_string(target.path().join("f.txt")).unwrap(), "alpha and alpha");
    }
}
