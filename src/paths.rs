//! Root-relative path helpers.
//!
//! Every path the engine reasons about is a `/`-separated string relative to
//! the project root, with no leading `./` and no empty components.

use std::path::{Component, Path, PathBuf};

/// Normalize a user-supplied relative path: backslashes become `/`, leading
/// `./` and trailing `/` are dropped. `"."` and `""` both become `""`.
pub fn normalize_rel(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Express `path` relative to `root`, if it lies inside it.
///
/// Both paths are made absolute against the current directory first, and
/// canonicalized when they exist, so `./out.json` and `/abs/root/out.json`
/// compare equal.
pub fn rel_to_root(root: &Path, path: &Path) -> Option<String> {
    let root = absolutize(root);
    let path = absolutize(path);
    let stripped = path.strip_prefix(&root).ok()?;
    let rel = stripped
        .components()
        .filter_map(|c| match c {
            Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    if rel.is_empty() {
        None
    } else {
        Some(rel)
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // Not on disk yet (e.g. an output file): canonicalize the parent instead.
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let reparented = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().ok().map(|p| p.join(name)),
        _ => None,
    };
    reparented.unwrap_or(absolute)
}

/// Join a root-relative path onto a directory.
pub fn join_rel(base: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// The last component of a relative path.
pub fn basename(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Strict ancestor directories of `rel`, nearest last: `a/b/c` gives
/// `a`, `a/b`.
pub fn ancestors(rel: &str) -> impl Iterator<Item = &str> {
    rel.match_indices('/').map(move |(idx, _)| &rel[..idx])
}

/// Check that an artifact entry path stays inside the target directory.
pub fn is_safe_rel(rel: &str) -> bool {
    if rel.is_empty() || rel.starts_with('/') || rel.contains('\\') || rel.contains('\0') {
        return false;
    }
    let path = Path::new(rel);
    if path.is_absolute() {
        return false;
    }
    rel.split('/')
        .all(|part| !part.is_empty() && part != "." && part != ".." && !part.contains(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rel() {
        assert_eq!(normalize_rel("."), "");
        assert_eq!(normalize_rel(""), "");
        assert_eq!(normalize_rel("./src/"), "src");
        assert_eq!(normalize_rel("src\\lib.rs"), "src/lib.rs");
        assert_eq!(normalize_rel("a//b/./c"), "a/b/c");
    }

    #[test]
    fn test_ancestors() {
        let found: Vec<_> = ancestors("a/b/c.txt").collect();
        assert_eq!(found, vec!["a", "a/b"]);
        assert_eq!(ancestors("top.txt").count(), 0);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("c.txt"), "c.txt");
    }

    #[test]
    fn test_is_safe_rel() {
        assert!(is_safe_rel("src/main.rs"));
        assert!(is_safe_rel(".hidden/file"));
        assert!(!is_safe_rel("../etc/passwd"));
        assert!(!is_safe_rel("a/../../b"));
        assert!(!is_safe_rel("/etc/passwd"));
        assert!(!is_safe_rel("a//b"));
        assert!(!is_safe_rel("C:/windows"));
        assert!(!is_safe_rel(""));
    }

    #[test]
    fn test_rel_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/file.txt"), "x").unwrap();

        assert_eq!(
            rel_to_root(dir.path(), &dir.path().join("sub/file.txt")),
            Some("sub/file.txt".to_string())
        );
        // Output files need not exist yet.
        assert_eq!(
            rel_to_root(dir.path(), &dir.path().join("out.json")),
            Some("out.json".to_string())
        );
        assert_eq!(rel_to_root(dir.path(), dir.path()), None);
        assert_eq!(rel_to_root(&dir.path().join("sub"), dir.path()), None);
    }
}
