//! Path normalization and minimal watch-root computation.
//!
//! Containers can share, nest, or overlap physical directories. Before
//! handing anything to the native watcher we collapse the candidate set
//! into the minimal covering set of roots: any directory that is a
//! descendant of another candidate is absorbed by its ancestor.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use super::error::WatchError;

/// Normalize a single path lexically.
///
/// Resolves `.` and `..` segments without touching the filesystem. Empty
/// and relative paths are rejected: every path crossing the service
/// boundary must be absolute so that equality is plain path equality.
pub fn normalize_path(path: &Path) -> Result<PathBuf, WatchError> {
    if path.as_os_str().is_empty() {
        return Err(WatchError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is empty".to_string(),
        });
    }

    if !path.is_absolute() {
        return Err(WatchError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is not absolute".to_string(),
        });
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is malformed input, not a no-op.
                if !normalized.pop() {
                    return Err(WatchError::InvalidPath {
                        path: path.to_path_buf(),
                        reason: "path escapes the filesystem root".to_string(),
                    });
                }
            }
        }
    }

    Ok(normalized)
}

/// Collapse a collection of directories into the minimal set of watch roots.
///
/// Every input is contained in (or equal to) exactly one output root.
/// Candidates are normalized first, then visited in ascending segment
/// depth so ancestors are accepted before the descendants they absorb.
/// The descendant test is `Path::starts_with`, which compares whole
/// segments: `/foo` never absorbs `/foobar`.
///
/// All-or-nothing: one malformed input fails the whole call. Idempotent:
/// feeding the output back in returns the same set.
pub fn normalize_roots(
    dirs: impl IntoIterator<Item = PathBuf>,
) -> Result<HashSet<PathBuf>, WatchError> {
    let mut normalized = dirs
        .into_iter()
        .map(|dir| normalize_path(&dir))
        .collect::<Result<Vec<_>, _>>()?;

    normalized.sort_by_key(|path| path.components().count());

    let mut roots: HashSet<PathBuf> = HashSet::new();
    for candidate in normalized {
        if !roots.iter().any(|root| candidate.starts_with(root)) {
            roots.insert(candidate);
        }
    }

    Ok(roots)
}
