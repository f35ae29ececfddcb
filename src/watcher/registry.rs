//! Container registry with reverse path-ownership index.
//!
//! A container is a logical unit (solution or workspace) owning a set of
//! tracked file paths plus a base directory. The registry is the single
//! owner of the container -> file-set mapping and keeps a reverse index
//! from file path to owning containers for per-event lookup. It also
//! holds the ad-hoc directory set, which carries no ownership semantics.
//!
//! Paths are interned: a file shared by several containers is stored once.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::WatchError;

/// Opaque handle identifying a registered container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// One registered container: its tracked files and base directory.
#[derive(Debug)]
struct ContainerEntry {
    files: HashSet<Arc<PathBuf>>,
    base_dir: PathBuf,
}

/// Registry of containers, their tracked files, and the ad-hoc watch set.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: HashMap<ContainerId, ContainerEntry>,
    /// Reverse index: file path -> containers that currently own it.
    owners: HashMap<Arc<PathBuf>, HashSet<ContainerId>>,
    /// Ad-hoc watched directories (raw semantics, full-replace only).
    adhoc: HashSet<PathBuf>,
    next_id: u64,
}

impl ContainerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container with its initial file set and base directory.
    ///
    /// Paths must already be normalized by the caller.
    pub fn insert(
        &mut self,
        files: impl IntoIterator<Item = PathBuf>,
        base_dir: PathBuf,
    ) -> ContainerId {
        let id = ContainerId(self.next_id);
        self.next_id += 1;

        self.containers.insert(
            id,
            ContainerEntry {
                files: HashSet::new(),
                base_dir,
            },
        );

        for file in files {
            self.index_file(id, file);
        }

        id
    }

    /// Unregister a container, dropping all of its ownership entries.
    ///
    /// Events already queued for routing will no longer resolve to this
    /// container: the router re-checks ownership at dispatch time.
    pub fn remove(&mut self, id: ContainerId) -> Result<(), WatchError> {
        let entry = self
            .containers
            .remove(&id)
            .ok_or(WatchError::UnknownContainer { id })?;

        for file in entry.files {
            self.unindex_file(id, &file);
        }

        Ok(())
    }

    /// Replace a container's tracked file set.
    ///
    /// Computes the symmetric difference against the prior set and
    /// adjusts the reverse index incrementally.
    pub fn update_files(
        &mut self,
        id: ContainerId,
        new_files: impl IntoIterator<Item = PathBuf>,
    ) -> Result<(), WatchError> {
        let entry = self
            .containers
            .get(&id)
            .ok_or(WatchError::UnknownContainer { id })?;

        let new_set: HashSet<PathBuf> = new_files.into_iter().collect();

        let added: Vec<PathBuf> = new_set
            .iter()
            .filter(|f| !entry.files.contains(*f))
            .cloned()
            .collect();
        let removed: Vec<Arc<PathBuf>> = entry
            .files
            .iter()
            .filter(|f| !new_set.contains(f.as_ref()))
            .cloned()
            .collect();

        for file in removed {
            self.unindex_file(id, &file);
        }
        for file in added {
            self.index_file(id, file);
        }

        Ok(())
    }

    /// Replace the entire ad-hoc directory set.
    pub fn set_adhoc(&mut self, dirs: HashSet<PathBuf>) {
        self.adhoc = dirs;
    }

    /// Containers that currently own the given path.
    pub fn owners(&self, path: &Path) -> Option<&HashSet<ContainerId>> {
        self.owners.get(&path.to_path_buf())
    }

    /// Whether at least one registered container owns the path.
    pub fn is_owned(&self, path: &Path) -> bool {
        self.owners(path).is_some_and(|set| !set.is_empty())
    }

    /// Whether the path falls under an ad-hoc watched directory.
    pub fn is_adhoc_covered(&self, path: &Path) -> bool {
        self.adhoc.iter().any(|dir| path.starts_with(dir))
    }

    /// All tracked files under the given directory (segment-boundary).
    ///
    /// Used to cascade a directory deletion into per-file removals.
    pub fn files_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.owners
            .keys()
            .filter(|file| file.starts_with(dir))
            .map(|file| file.as_ref().clone())
            .collect()
    }

    /// Candidate directories the normalizer collapses into watch roots:
    /// every container base directory, the parent of every tracked file
    /// (covers files living outside their container's tree), and the
    /// ad-hoc directories.
    pub fn watch_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        for entry in self.containers.values() {
            candidates.push(entry.base_dir.clone());
            for file in &entry.files {
                if let Some(parent) = file.parent() {
                    candidates.push(parent.to_path_buf());
                }
            }
        }

        candidates.extend(self.adhoc.iter().cloned());
        candidates
    }

    /// Number of registered containers.
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Number of distinct tracked file paths.
    pub fn tracked_path_count(&self) -> usize {
        self.owners.len()
    }

    /// Tracked files of one container, for tests and diagnostics.
    pub fn files_of(&self, id: ContainerId) -> Option<Vec<PathBuf>> {
        self.containers
            .get(&id)
            .map(|e| e.files.iter().map(|f| f.as_ref().clone()).collect())
    }

    fn index_file(&mut self, id: ContainerId, file: PathBuf) {
        // Reuse the interned Arc when another container already owns it.
        let interned = match self.owners.get_key_value(&file) {
            Some((existing, _)) => existing.clone(),
            None => Arc::new(file),
        };

        self.owners.entry(interned.clone()).or_default().insert(id);

        if let Some(entry) = self.containers.get_mut(&id) {
            entry.files.insert(interned);
        }
    }

    fn unindex_file(&mut self, id: ContainerId, file: &PathBuf) {
        if let Some(entry) = self.containers.get_mut(&id) {
            entry.files.remove(file);
        }

        match self.owners.get_mut(file) {
            Some(set) => {
                let was_present = set.remove(&id);
                debug_assert!(
                    was_present,
                    "reverse index missing owner {id} for {}",
                    file.display()
                );
                if !was_present {
                    self.heal();
                    return;
                }
                if set.is_empty() {
                    self.owners.remove(file);
                }
            }
            None => {
                debug_assert!(false, "reverse index missing path {}", file.display());
                self.heal();
            }
        }
    }

    /// Rebuild the reverse index from the container map after a detected
    /// desync. Fatal in debug builds via the debug_assert at the call
    /// site; release builds log and carry on with the healed index.
    fn heal(&mut self) {
        tracing::error!("[registry] reverse index desync detected, rebuilding");

        self.owners.clear();
        let memberships: Vec<(ContainerId, Vec<Arc<PathBuf>>)> = self
            .containers
            .iter()
            .map(|(id, entry)| (*id, entry.files.iter().cloned().collect()))
            .collect();

        for (id, files) in memberships {
            for file in files {
                self.owners.entry(file).or_default().insert(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ContainerRegistry::new();

        let id = registry.insert(
            vec![file("/sol/p1/Program.cs"), file("/sol/p1/p1.csproj")],
            file("/sol"),
        );

        assert!(registry.is_owned(Path::new("/sol/p1/Program.cs")));
        assert_eq!(
            registry.owners(Path::new("/sol/p1/Program.cs")),
            Some(&HashSet::from([id]))
        );
        assert!(!registry.is_owned(Path::new("/sol/p1/Other.cs")));
        assert_eq!(registry.container_count(), 1);
        assert_eq!(registry.tracked_path_count(), 2);
    }

    #[test]
    fn test_shared_file_two_containers() {
        let mut registry = ContainerRegistry::new();

        let shared = file("/common/Shared.cs");
        let id1 = registry.insert(vec![shared.clone()], file("/sol1"));
        let id2 = registry.insert(vec![shared.clone()], file("/sol2"));

        assert_eq!(registry.owners(&shared), Some(&HashSet::from([id1, id2])));
        // Interned: one distinct tracked path.
        assert_eq!(registry.tracked_path_count(), 1);

        registry.remove(id1).unwrap();
        assert_eq!(registry.owners(&shared), Some(&HashSet::from([id2])));

        registry.remove(id2).unwrap();
        assert!(!registry.is_owned(&shared));
        assert_eq!(registry.tracked_path_count(), 0);
    }

    #[test]
    fn test_remove_unknown_container() {
        let mut registry = ContainerRegistry::new();
        let id = registry.insert(Vec::new(), file("/sol"));
        registry.remove(id).unwrap();

        assert!(matches!(
            registry.remove(id),
            Err(WatchError::UnknownContainer { .. })
        ));
    }

    #[test]
    fn test_update_files_symmetric_difference() {
        let mut registry = ContainerRegistry::new();

        let a = file("/sol/a.cs");
        let b = file("/sol/b.cs");
        let c = file("/sol/c.cs");

        let id = registry.insert(vec![a.clone(), b.clone()], file("/sol"));

        registry.update_files(id, vec![b.clone(), c.clone()]).unwrap();

        assert!(!registry.is_owned(&a));
        assert!(registry.is_owned(&b));
        assert!(registry.is_owned(&c));
    }

    #[test]
    fn test_update_files_roundtrip_restores_original() {
        let mut registry = ContainerRegistry::new();

        let a = file("/sol/a.cs");
        let b = file("/sol/b.cs");
        let extra = file("/elsewhere/x.cs");

        let id = registry.insert(vec![a.clone(), b.clone()], file("/sol"));

        registry
            .update_files(id, vec![a.clone(), b.clone(), extra.clone()])
            .unwrap();
        registry.update_files(id, vec![a.clone(), b.clone()]).unwrap();

        let mut files = registry.files_of(id).unwrap();
        files.sort();
        assert_eq!(files, vec![a, b]);
        assert!(!registry.is_owned(&extra));
    }

    #[test]
    fn test_adhoc_coverage_and_replace() {
        let mut registry = ContainerRegistry::new();

        registry.set_adhoc(HashSet::from([file("/x")]));
        assert!(registry.is_adhoc_covered(Path::new("/x/deep/file.txt")));
        assert!(!registry.is_adhoc_covered(Path::new("/xavier/file.txt")));

        // Full replace: /x stops being covered immediately.
        registry.set_adhoc(HashSet::from([file("/y")]));
        assert!(!registry.is_adhoc_covered(Path::new("/x/deep/file.txt")));
        assert!(registry.is_adhoc_covered(Path::new("/y/file.txt")));
    }

    #[test]
    fn test_files_under_directory() {
        let mut registry = ContainerRegistry::new();

        registry.insert(
            vec![
                file("/sol/p1/a.cs"),
                file("/sol/p1/sub/b.cs"),
                file("/sol/p2/c.cs"),
            ],
            file("/sol"),
        );

        let mut under = registry.files_under(Path::new("/sol/p1"));
        under.sort();
        assert_eq!(under, vec![file("/sol/p1/a.cs"), file("/sol/p1/sub/b.cs")]);
    }

    #[test]
    fn test_watch_candidates_include_external_file_parents() {
        let mut registry = ContainerRegistry::new();

        registry.insert(
            vec![file("/sol/p1/a.cs"), file("/outside/linked.cs")],
            file("/sol"),
        );
        registry.set_adhoc(HashSet::from([file("/adhoc")]));

        let candidates = registry.watch_candidates();
        assert!(candidates.contains(&file("/sol")));
        assert!(candidates.contains(&file("/outside")));
        assert!(candidates.contains(&file("/adhoc")));
    }
}
