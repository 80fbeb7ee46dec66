//! VCS metadata detection and the `git check-ignore` oracle.

use crate::ignore_rules::IgnoreMatcher;
use crate::paths::basename;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// VCS internal directories that are never packaged unless explicitly requested.
pub const VCS_INTERNALS: &[&str] = &[
    ".git", ".jj", ".svn", ".hg", ".bzr", "_darcs", ".pijul", "CVS", ".fossil",
];

/// Git bookkeeping files recognised by basename.
pub const VCS_DOTFILES: &[&str] = &[".gitignore", ".gitattributes", ".gitmodules", ".gitkeep"];

/// Check if a relative path is VCS metadata: inside a VCS internal directory
/// at any depth, or a well-known VCS dotfile.
pub fn is_vcs_path(rel: &str) -> bool {
    if rel.split('/').any(|segment| VCS_INTERNALS.contains(&segment)) {
        return true;
    }
    VCS_DOTFILES.contains(&basename(rel))
}

/// Check whether `root` is inside a git work tree and the `git` binary answers.
pub fn git_worktree_available(root: &Path) -> bool {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("--is-inside-work-tree")
        .current_dir(root)
        .stderr(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim() == "true"
        }
        Ok(_) => false,
        Err(err) => {
            debug!("git unavailable: {}", err);
            false
        }
    }
}

/// Authoritative ignore oracle backed by `git check-ignore`.
///
/// Queried once per path; read-only.
#[derive(Debug, Clone)]
pub struct GitCheckIgnore {
    root: PathBuf,
}

impl GitCheckIgnore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl IgnoreMatcher for GitCheckIgnore {
    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool {
        // A trailing slash lets git apply directory-only patterns to paths
        // that do not exist on disk.
        let query = if is_dir {
            format!("{}/", rel)
        } else {
            rel.to_string()
        };

        let status = Command::new("git")
            .arg("check-ignore")
            .arg("-q")
            .arg("--")
            .arg(&query)
            .current_dir(&self.root)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => match status.code() {
                Some(0) => true,
                Some(1) => false,
                code => {
                    warn!("git check-ignore failed for {} ({:?}), treating as not ignored", rel, code);
                    false
                }
            },
            Err(err) => {
                warn!("git check-ignore could not run for {}: {}", rel, err);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "git check-ignore"
    }
}
