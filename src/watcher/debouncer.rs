//! Coalescing of bursty native notifications.
//!
//! Native filesystem APIs commonly fire several notifications for one
//! logical write or delete. Each path gets a quiet window: a new event
//! for the same path replaces the pending one and resets the timer, so a
//! burst collapses into a single entry carrying the latest kind.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::event::RawEventKind;

/// Coalesces raw events by path over a quiet window.
///
/// A `Removed` arriving after a pending `Changed` supersedes it; a
/// `Changed` after a pending `Removed` means the path was recreated.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending events: path -> (latest kind, last seen).
    pending: HashMap<PathBuf, (RawEventKind, Instant)>,
    /// How long a path must be quiet before dispatch.
    duration: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given quiet window in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record a raw event, replacing any pending entry for the path.
    ///
    /// `observed` is the adapter's stamp from when the native layer
    /// reported the event; the quiet window is measured from there, so
    /// time an event spends queued counts toward it.
    pub fn record(&mut self, path: PathBuf, kind: RawEventKind, observed: Instant) {
        self.pending.insert(path, (kind, observed));
    }

    /// Take all entries that have been quiet for the full window.
    ///
    /// Returned entries are removed from pending.
    pub fn take_ready(&mut self) -> Vec<(PathBuf, RawEventKind)> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, (kind, last_seen)| {
            if now.duration_since(*last_seen) >= self.duration {
                ready.push((path.clone(), *kind));
                false
            } else {
                true
            }
        });

        ready
    }

    /// Check if there are any pending entries.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Get the number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
