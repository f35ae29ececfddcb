//! Event routing: from raw notifications to per-cycle dispatch batches.
//!
//! Single-consumer loop draining the adapter channel. Raw events sit in
//! the debouncer until their quiet window elapses; each tick, the ready
//! set is resolved against the registry and broadcast as at most one
//! Changed and one Removed batch. Ownership is evaluated immediately
//! before dispatch, so unregistering a container or replacing the ad-hoc
//! set silences every event processed after that point, including events
//! already in flight.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::adapter::WatchAdapter;
use super::broadcast::{ChangeBroadcaster, FileEvent};
use super::debouncer::Debouncer;
use super::event::{RawEvent, RawEventKind};
use super::registry::ContainerRegistry;

pub(crate) struct EventRouter {
    registry: Arc<RwLock<ContainerRegistry>>,
    adapter: Arc<Mutex<WatchAdapter>>,
    broadcaster: ChangeBroadcaster,
    rx: mpsc::Receiver<RawEvent>,
    debouncer: Debouncer,
    tick: Duration,
    retry_interval: Duration,
    shutdown: CancellationToken,
}

impl EventRouter {
    pub(crate) fn new(
        registry: Arc<RwLock<ContainerRegistry>>,
        adapter: Arc<Mutex<WatchAdapter>>,
        broadcaster: ChangeBroadcaster,
        rx: mpsc::Receiver<RawEvent>,
        debounce_ms: u64,
        retry_interval_ms: u64,
        shutdown: CancellationToken,
    ) -> Self {
        // Poll at half the quiet window so a ready path waits at most
        // ~1.5 windows before dispatch.
        let tick = Duration::from_millis((debounce_ms / 2).clamp(10, 100));

        Self {
            registry,
            adapter,
            broadcaster,
            rx,
            debouncer: Debouncer::new(debounce_ms),
            tick,
            retry_interval: Duration::from_millis(retry_interval_ms),
            shutdown,
        }
    }

    /// Main processing loop.
    pub(crate) async fn run(mut self) {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_retry = Instant::now();

        crate::debug_event!("router", "started");

        loop {
            tokio::select! {
                maybe = self.rx.recv() => {
                    match maybe {
                        Some(raw) => self.handle_raw(raw),
                        None => {
                            crate::debug_event!("router", "event channel closed");
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    let ready = self.debouncer.take_ready();
                    if !ready.is_empty() {
                        self.dispatch_cycle(ready);
                    }

                    if last_retry.elapsed() >= self.retry_interval {
                        self.adapter.lock().retry_pending();
                        last_retry = Instant::now();
                    }
                }

                _ = self.shutdown.cancelled() => {
                    crate::debug_event!("router", "shutdown");
                    break;
                }
            }
        }
    }

    fn handle_raw(&mut self, raw: RawEvent) {
        crate::debug_event!(
            "router",
            "raw",
            "{:?} {} (root {:?})",
            raw.kind,
            raw.path.display(),
            raw.root.as_deref().map(|r| r.display().to_string())
        );
        self.debouncer.record(raw.path, raw.kind, raw.observed);
    }

    fn dispatch_cycle(&self, ready: Vec<(PathBuf, RawEventKind)>) {
        // A change whose path is gone by dispatch time is a removal
        // (rename-as-modify on some platforms).
        let ready: Vec<(PathBuf, RawEventKind)> = ready
            .into_iter()
            .map(|(path, kind)| {
                if kind == RawEventKind::Changed && !path.exists() {
                    (path, RawEventKind::Removed)
                } else {
                    (path, kind)
                }
            })
            .collect();

        // Short-held read; dropped before any broadcast so a subscriber
        // re-entering the service cannot deadlock.
        let (changed, removed) = {
            let registry = self.registry.read();
            route_ready(&registry, &ready)
        };

        if !changed.is_empty() {
            crate::log_event!("router", "changed", "{} paths", changed.len());
            self.broadcaster.send(FileEvent::Changed { paths: changed });
        }
        if !removed.is_empty() {
            crate::log_event!("router", "removed", "{} paths", removed.len());
            self.broadcaster.send(FileEvent::Removed { paths: removed });
        }
    }
}

/// Resolve ready events against the registry into dispatch batches.
///
/// Removals resolve first: a removed path that is itself tracked counts
/// once; an untracked removed path cascades to every tracked file under
/// it (directory delete) and, if ad-hoc covered, to the path itself.
/// Changes are kept when at least one container owns the path or an
/// ad-hoc directory covers it. Each batch is free of duplicates.
pub(crate) fn route_ready(
    registry: &ContainerRegistry,
    ready: &[(PathBuf, RawEventKind)],
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut changed = Vec::new();
    let mut changed_seen: HashSet<PathBuf> = HashSet::new();
    let mut removed = Vec::new();
    let mut removed_seen: HashSet<PathBuf> = HashSet::new();

    for (path, _) in ready.iter().filter(|(_, k)| *k == RawEventKind::Removed) {
        if registry.is_owned(path) {
            push_unique(&mut removed, &mut removed_seen, path.clone());
        } else {
            for file in registry.files_under(path) {
                push_unique(&mut removed, &mut removed_seen, file);
            }
            if registry.is_adhoc_covered(path) {
                push_unique(&mut removed, &mut removed_seen, path.clone());
            }
        }
    }

    for (path, _) in ready.iter().filter(|(_, k)| *k == RawEventKind::Changed) {
        // Removal wins when the same path shows up both ways in a cycle.
        if removed_seen.contains(path) {
            continue;
        }
        if registry.is_owned(path) || registry.is_adhoc_covered(path) {
            push_unique(&mut changed, &mut changed_seen, path.clone());
        }
    }

    (changed, removed)
}

fn push_unique(batch: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: PathBuf) {
    if seen.insert(path.clone()) {
        batch.push(path);
    }
}
