//! Native watch adapter over `notify`.
//!
//! Owns the recursive watcher and the set of live watch roots. Roots
//! that cannot be watched yet (missing directory, permissions) are
//! parked and retried; a failed root degrades to "not watched" and never
//! takes the service down.
//!
//! The notify callback does the minimum: translate the native event,
//! stamp it, and push it onto a bounded channel feeding the router.
//! Backpressure policy is block-producer: when the channel is full the
//! native callback thread waits rather than dropping events.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::error::WatchError;
use super::event::{self, RawEvent};

/// Wraps the native recursive-directory watcher.
pub struct WatchAdapter {
    watcher: RecommendedWatcher,
    /// Roots successfully handed to the native watcher.
    active: HashSet<PathBuf>,
    /// Roots that failed to establish, retried when they appear.
    pending: HashSet<PathBuf>,
    /// Active roots shared with the notify callback for event tagging.
    shared_roots: Arc<RwLock<HashSet<PathBuf>>>,
}

impl WatchAdapter {
    /// Create the adapter and the raw-event channel the router drains.
    pub fn new(channel_capacity: usize) -> Result<(Self, mpsc::Receiver<RawEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let shared_roots: Arc<RwLock<HashSet<PathBuf>>> = Arc::new(RwLock::new(HashSet::new()));

        let callback_roots = shared_roots.clone();
        let watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(native) => {
                    for (path, kind) in event::translate(&native) {
                        let root = {
                            let roots = callback_roots.read();
                            roots.iter().find(|r| path.starts_with(r)).cloned()
                        };
                        let raw = RawEvent {
                            path,
                            kind,
                            root,
                            observed: Instant::now(),
                        };
                        // Router gone means shutdown; stop forwarding.
                        if tx.blocking_send(raw).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("[adapter] native watch error: {e}");
                }
            })?;

        Ok((
            Self {
                watcher,
                active: HashSet::new(),
                pending: HashSet::new(),
                shared_roots,
            },
            rx,
        ))
    }

    /// Bring the native watch set in line with the desired root set.
    ///
    /// Stops watches for roots no longer desired (including parked ones)
    /// and starts watches for new roots.
    pub fn apply_roots(&mut self, desired: &HashSet<PathBuf>) {
        let stale: Vec<PathBuf> = self
            .active
            .iter()
            .chain(self.pending.iter())
            .filter(|root| !desired.contains(*root))
            .cloned()
            .collect();

        for root in stale {
            self.stop_watch(&root);
        }

        let new: Vec<PathBuf> = desired
            .iter()
            .filter(|root| !self.active.contains(*root) && !self.pending.contains(*root))
            .cloned()
            .collect();

        for root in new {
            self.start_watch(root);
        }
    }

    /// Re-attempt establishment for parked roots that now exist.
    pub fn retry_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let candidates: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|root| root.exists())
            .cloned()
            .collect();

        for root in candidates {
            self.pending.remove(&root);
            self.start_watch(root);
        }
    }

    /// Number of live native watches.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of roots parked for retry.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn start_watch(&mut self, root: PathBuf) {
        match self.watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => {
                crate::debug_event!("adapter", "watching", "{}", root.display());
                self.shared_roots.write().insert(root.clone());
                self.active.insert(root);
            }
            Err(e) => {
                // Degrade, never crash: park the root and retry later.
                let err = WatchError::WatchUnavailable {
                    path: root.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!("[adapter] {err}, will retry");
                self.pending.insert(root);
            }
        }
    }

    fn stop_watch(&mut self, root: &Path) {
        if self.active.remove(root) {
            self.shared_roots.write().remove(root);
            if let Err(e) = self.watcher.unwatch(root) {
                crate::debug_event!("adapter", "unwatch failed", "{}: {e}", root.display());
            } else {
                crate::debug_event!("adapter", "unwatched", "{}", root.display());
            }
        }
        self.pending.remove(root);
    }
}
