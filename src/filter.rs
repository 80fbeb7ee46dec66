//! Path eligibility.

use crate::ignore_rules::IgnoreMatcher;
use crate::vcs::is_vcs_path;

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Why a path was excluded, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionReason {
    /// The program itself, the artifact or the selection record
    SelfPath,
    /// The mapping specification
    MappingFile,
    /// Listed under `ignore-folders`
    IgnoredFolder,
    /// VCS internals or bookkeeping files
    Vcs,
    /// Matched by the ignore rules
    Ignored,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SelfPath => "generated by this run",
            Self::MappingFile => "mapping specification",
            Self::IgnoredFolder => "ignore-folders",
            Self::Vcs => "VCS metadata",
            Self::Ignored => "ignore rules",
        };
        f.write_str(label)
    }
}

/// Decides whether a root-relative path may be packaged.
pub struct PathFilter {
    self_paths: BTreeSet<String>,
    mapping_path: Option<String>,
    ignore_folders: Vec<String>,
    include_vcs: bool,
    include_ignored: bool,
    matcher: Option<Box<dyn IgnoreMatcher>>,
}

impl PathFilter {
    pub fn new() -> Self {
        Self {
            self_paths: BTreeSet::new(),
            mapping_path: None,
            ignore_folders: Vec::new(),
            include_vcs: false,
            include_ignored: false,
            matcher: None,
        }
    }

    /// Exclude a path produced or used by this run (program, artifact, record).
    /// `None` (a path outside the root) is ignored.
    pub fn with_self_path(mut self, rel: Option<String>) -> Self {
        if let Some(rel) = rel {
            self.self_paths.insert(rel);
        }
        self
    }

    pub fn with_mapping_path(mut self, rel: Option<String>) -> Self {
        self.mapping_path = rel;
        self
    }

    pub fn with_ignore_folders(mut self, folders: &[String]) -> Self {
        self.ignore_folders = folders.to_vec();
        self
    }

    pub fn include_vcs(mut self, include: bool) -> Self {
        self.include_vcs = include;
        self
    }

    pub fn include_ignored(mut self, include: bool) -> Self {
        self.include_ignored = include;
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn IgnoreMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Check whether `rel` must be left out. Deterministic and side-effect free.
    ///
    /// `is_dir` matters for directory-only ignore patterns such as `build/`.
    pub fn should_exclude(&self, rel: &str, is_dir: bool) -> bool {
        self.exclusion_reason(rel, is_dir).is_some()
    }

    /// The first exclusion rule that applies to `rel`, if any.
    pub fn exclusion_reason(&self, rel: &str, is_dir: bool) -> Option<ExclusionReason> {
        if self.self_paths.contains(rel) {
            return Some(ExclusionReason::SelfPath);
        }
        if self.mapping_path.as_deref() == Some(rel) {
            return Some(ExclusionReason::MappingFile);
        }
        if self.in_ignored_folder(rel) {
            return Some(ExclusionReason::IgnoredFolder);
        }
        if !self.include_vcs && is_vcs_path(rel) {
            return Some(ExclusionReason::Vcs);
        }
        if !self.include_ignored {
            if let Some(matcher) = &self.matcher {
                if matcher.is_ignored(rel, is_dir) {
                    return Some(ExclusionReason::Ignored);
                }
            }
        }
        None
    }

    fn in_ignored_folder(&self, rel: &str) -> bool {
        self.ignore_folders.iter().any(|folder| {
            rel == folder
                || rel.starts_with(&format!("{}/", folder))
                || rel.split('/').any(|segment| segment == folder)
        })
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new()
    }
}
