//! Ignore-rule evaluation.
//!
//! Two matchers share the [`IgnoreMatcher`] capability:
//!
//! - [`GitCheckIgnore`](crate::vcs::GitCheckIgnore) asks git itself and is
//!   authoritative when a work tree is available.
//! - [`PatternIgnore`] compiles the root `.gitignore` with the `ignore`
//!   crate's gitignore matcher. Nested `.gitignore` files are not read.
//!
//! Differences from git: an unanchored pattern with an inner `/` matches as
//! a component-aligned suffix rather than from the root, and the path itself
//! is checked before its parents, so `!logs/keep.txt` re-includes a file
//! under an ignored `logs/`.

use crate::error::{PackError, Result};
use crate::vcs::{git_worktree_available, GitCheckIgnore};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Capability answering "is this root-relative path ignored?".
pub trait IgnoreMatcher: Send + Sync {
    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}

/// Which ignore matcher to use for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreOracle {
    /// Use git when the root is inside a work tree, otherwise the built-in patterns
    #[default]
    Auto,
    /// Require `git check-ignore`
    Git,
    /// Use the built-in `.gitignore` evaluator
    Patterns,
}

/// Build the matcher for `root` according to `oracle`.
pub fn select_matcher(root: &Path, oracle: IgnoreOracle) -> Result<Box<dyn IgnoreMatcher>> {
    match oracle {
        IgnoreOracle::Git => {
            if git_worktree_available(root) {
                Ok(Box::new(GitCheckIgnore::new(root)))
            } else {
                Err(PackError::CapabilityUnavailable(format!(
                    "git check-ignore (is {} inside a git work tree?)",
                    root.display()
                )))
            }
        }
        IgnoreOracle::Patterns => Ok(Box::new(PatternIgnore::load(root)?)),
        IgnoreOracle::Auto => {
            if git_worktree_available(root) {
                debug!("using git check-ignore for {}", root.display());
                Ok(Box::new(GitCheckIgnore::new(root)))
            } else {
                debug!("using built-in .gitignore patterns for {}", root.display());
                Ok(Box::new(PatternIgnore::load(root)?))
            }
        }
    }
}

/// Built-in fallback matcher over the project's root `.gitignore`.
#[derive(Debug, Clone)]
pub struct PatternIgnore {
    rules: Gitignore,
}

impl Default for PatternIgnore {
    fn default() -> Self {
        Self {
            rules: Gitignore::empty(),
        }
    }
}

impl PatternIgnore {
    /// Load `<root>/.gitignore`; a missing file yields an empty matcher.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(".gitignore");
        match fs::read_to_string(&path) {
            Ok(content) => Self::build(root, Some(&path), &content),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(PackError::io(path, err)),
        }
    }

    /// Compile patterns given as `.gitignore` text.
    pub fn from_lines(content: &str) -> Result<Self> {
        Self::build(Path::new(""), None, content)
    }

    fn build(root: &Path, origin: Option<&Path>, content: &str) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for line in content.lines() {
            let line = suffix_aligned(line);
            if let Err(err) = builder.add_line(origin.map(Path::to_path_buf), &line) {
                // git skips patterns it cannot parse
                warn!("ignoring invalid pattern '{}': {}", line, err);
            }
        }
        let rules = builder.build().map_err(|err| PackError::Config {
            path: origin.map(Path::to_path_buf).unwrap_or_default(),
            reason: err.to_string(),
        })?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl IgnoreMatcher for PatternIgnore {
    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool {
        self.rules
            .matched_path_or_any_parents(rel, is_dir)
            .is_ignore()
    }

    fn name(&self) -> &'static str {
        "built-in patterns"
    }
}

/// Rewrite an unanchored pattern with an inner `/` so it matches as a
/// component-aligned suffix (`docs/build` also matches `pkg/docs/build`).
/// git would anchor such a pattern to the root.
fn suffix_aligned(line: &str) -> String {
    let trimmed = line.trim_end();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return line.to_string();
    }
    let (bang, body) = match trimmed.strip_prefix('!') {
        Some(body) => ("!", body),
        None => ("", trimmed),
    };
    let inner_slash = body.trim_end_matches('/').contains('/');
    if inner_slash && !body.starts_with('/') && !body.starts_with("**/") {
        format!("{}**/{}", bang, body)
    } else {
        line.to_string()
    }
}
