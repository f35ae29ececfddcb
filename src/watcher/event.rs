//! Raw event types and native event translation.
//!
//! The adapter reduces the zoo of native notification kinds to the two
//! the service reasons about: a path changed, or a path went away.
//! Rename sequences become a removal of the old path plus a change of
//! the new one.

use std::path::PathBuf;
use std::time::Instant;

use notify::event::{Event, EventKind, ModifyKind, RenameMode};

/// What happened to a path, as far as consumers care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Changed,
    Removed,
}

/// One low-level filesystem notification after translation.
///
/// Ephemeral: raw events live on the adapter-to-router channel and are
/// never persisted.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
    /// The watch root this event surfaced under, when attributable.
    pub root: Option<PathBuf>,
    pub observed: Instant,
}

/// Translate a native notify event into raw (path, kind) pairs.
///
/// Creates and content/metadata modifications are changes. Rename-from
/// is a removal, rename-to a change; a combined rename carries both
/// paths in order. Access events are noise and dropped.
pub fn translate(event: &Event) -> Vec<(PathBuf, RawEventKind)> {
    match event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), RawEventKind::Changed))
            .collect(),

        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), RawEventKind::Removed))
            .collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| (p.clone(), RawEventKind::Removed))
            .collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|p| (p.clone(), RawEventKind::Changed))
            .collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(2);
            if let Some(old) = event.paths.first() {
                out.push((old.clone(), RawEventKind::Removed));
            }
            if let Some(new) = event.paths.get(1) {
                out.push((new.clone(), RawEventKind::Changed));
            }
            out
        }

        // Ambiguous renames and plain modifications: report as changed;
        // the router downgrades to a removal if the path is gone by
        // dispatch time.
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), RawEventKind::Changed))
            .collect(),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: Vec<&str>) -> Event {
        let mut e = Event::new(kind);
        for p in paths {
            e = e.add_path(PathBuf::from(p));
        }
        e
    }

    #[test]
    fn test_create_is_changed() {
        let e = event(EventKind::Create(CreateKind::File), vec!["/a/f.cs"]);
        assert_eq!(
            translate(&e),
            vec![(PathBuf::from("/a/f.cs"), RawEventKind::Changed)]
        );
    }

    #[test]
    fn test_data_modify_is_changed() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec!["/a/f.cs"],
        );
        assert_eq!(
            translate(&e),
            vec![(PathBuf::from("/a/f.cs"), RawEventKind::Changed)]
        );
    }

    #[test]
    fn test_remove_is_removed() {
        let e = event(EventKind::Remove(RemoveKind::File), vec!["/a/f.cs"]);
        assert_eq!(
            translate(&e),
            vec![(PathBuf::from("/a/f.cs"), RawEventKind::Removed)]
        );
    }

    #[test]
    fn test_rename_both_is_removed_plus_changed() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec!["/a/old.cs", "/a/new.cs"],
        );
        assert_eq!(
            translate(&e),
            vec![
                (PathBuf::from("/a/old.cs"), RawEventKind::Removed),
                (PathBuf::from("/a/new.cs"), RawEventKind::Changed),
            ]
        );
    }

    #[test]
    fn test_access_is_noise() {
        let e = event(
            EventKind::Access(notify::event::AccessKind::Close(
                notify::event::AccessMode::Write,
            )),
            vec!["/a/f.cs"],
        );
        assert!(translate(&e).is_empty());
    }
}
