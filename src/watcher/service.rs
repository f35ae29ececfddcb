//! Service facade: registration API and watch-root lifecycle.
//!
//! One `FileWatcherService` instance holds the whole subsystem: the
//! container registry, the native watch adapter, the router task, and
//! the subscriber broadcaster. Construct it once per process and hand
//! references to callers; there are no globals.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;

use super::adapter::WatchAdapter;
use super::broadcast::{ChangeBroadcaster, FileEvent};
use super::error::WatchError;
use super::paths::{normalize_path, normalize_roots};
use super::registry::{ContainerId, ContainerRegistry};
use super::router::EventRouter;

/// Scoped file-change notification service.
///
/// Watches the minimal set of directory roots covering every registered
/// container and the ad-hoc set, and broadcasts deduplicated
/// changed/removed batches to subscribers. Purely in-memory: state is
/// rebuilt from registrations on process start.
///
/// Every registry mutation recomputes the root set, so native watches
/// always track exactly what current registrations require.
pub struct FileWatcherService {
    registry: Arc<RwLock<ContainerRegistry>>,
    adapter: Arc<Mutex<WatchAdapter>>,
    broadcaster: ChangeBroadcaster,
    shutdown: CancellationToken,
}

impl FileWatcherService {
    /// Create a builder for configuring the service.
    pub fn builder() -> FileWatcherServiceBuilder {
        FileWatcherServiceBuilder::new()
    }

    /// Register a container with its tracked files and base directory.
    ///
    /// All paths are normalized on entry; a single malformed path fails
    /// the call without registering anything.
    pub fn register(
        &self,
        files: impl IntoIterator<Item = PathBuf>,
        base_directory: &Path,
    ) -> Result<ContainerId, WatchError> {
        let base = normalize_path(base_directory)?;
        let files = files
            .into_iter()
            .map(|f| normalize_path(&f))
            .collect::<Result<Vec<_>, _>>()?;

        let id = {
            let mut registry = self.registry.write();
            registry.insert(files, base)
        };

        crate::log_event!("service", "registered", "{id}");
        self.sync_roots();
        Ok(id)
    }

    /// Replace a container's tracked file set (full-set replace).
    pub fn update_files(
        &self,
        id: ContainerId,
        new_files: impl IntoIterator<Item = PathBuf>,
    ) -> Result<(), WatchError> {
        let files = new_files
            .into_iter()
            .map(|f| normalize_path(&f))
            .collect::<Result<Vec<_>, _>>()?;

        {
            let mut registry = self.registry.write();
            registry.update_files(id, files)?;
        }

        crate::debug_event!("service", "updated files", "{id}");
        self.sync_roots();
        Ok(())
    }

    /// Unregister a container.
    ///
    /// Takes effect for every event processed after this point: batches
    /// not yet dispatched will no longer resolve to this container.
    pub fn unregister(&self, id: ContainerId) -> Result<(), WatchError> {
        {
            let mut registry = self.registry.write();
            registry.remove(id)?;
        }

        crate::log_event!("service", "unregistered", "{id}");
        self.sync_roots();
        Ok(())
    }

    /// Replace the entire ad-hoc watch set atomically.
    ///
    /// Directories absent from the new set stop producing events
    /// immediately, even for writes already in flight.
    pub fn watch_directories(
        &self,
        dirs: impl IntoIterator<Item = PathBuf>,
    ) -> Result<(), WatchError> {
        let roots = normalize_roots(dirs)?;

        {
            let mut registry = self.registry.write();
            registry.set_adhoc(roots);
        }

        crate::log_event!("service", "ad-hoc watch set replaced");
        self.sync_roots();
        Ok(())
    }

    /// Subscribe to dispatch batches.
    ///
    /// Each subscriber drains its receiver on its own execution context;
    /// delivery is fire-and-forget and one subscriber cannot delay
    /// another.
    pub fn subscribe(&self) -> broadcast::Receiver<FileEvent> {
        self.broadcaster.subscribe()
    }

    /// Current service counters.
    pub fn stats(&self) -> WatcherStats {
        let registry = self.registry.read();
        let adapter = self.adapter.lock();
        WatcherStats {
            containers: registry.container_count(),
            tracked_paths: registry.tracked_path_count(),
            active_roots: adapter.active_count(),
            pending_roots: adapter.pending_count(),
        }
    }

    /// Recompute the minimal root set and reconcile native watches.
    ///
    /// Candidates come out of the registry already normalized, so root
    /// computation cannot fail here; a failed native watch degrades to a
    /// parked root inside the adapter.
    fn sync_roots(&self) {
        let candidates = {
            let registry = self.registry.read();
            registry.watch_candidates()
        };

        match normalize_roots(candidates) {
            Ok(desired) => {
                self.adapter.lock().apply_roots(&desired);
            }
            Err(e) => {
                tracing::error!("[service] root recomputation failed: {e}");
            }
        }
    }
}

impl Drop for FileWatcherService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Counters describing the live state of the service.
#[derive(Debug, Clone)]
pub struct WatcherStats {
    pub containers: usize,
    pub tracked_paths: usize,
    pub active_roots: usize,
    pub pending_roots: usize,
}

/// Builder for constructing a FileWatcherService.
pub struct FileWatcherServiceBuilder {
    debounce_ms: u64,
    channel_capacity: usize,
    broadcast_capacity: usize,
    retry_interval_ms: u64,
}

impl FileWatcherServiceBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        let defaults = crate::config::WatcherConfig::default();
        Self {
            debounce_ms: defaults.debounce_ms,
            channel_capacity: defaults.channel_capacity,
            broadcast_capacity: defaults.broadcast_capacity,
            retry_interval_ms: defaults.retry_interval_ms,
        }
    }

    /// Take all tunables from loaded settings.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.debounce_ms = settings.watcher.debounce_ms;
        self.channel_capacity = settings.watcher.channel_capacity;
        self.broadcast_capacity = settings.watcher.broadcast_capacity;
        self.retry_interval_ms = settings.watcher.retry_interval_ms;
        self
    }

    /// Set the coalescing quiet window in milliseconds.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the adapter-to-router channel capacity (block-producer
    /// backpressure once full).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the retry cadence for roots that could not be watched.
    pub fn retry_interval_ms(mut self, ms: u64) -> Self {
        self.retry_interval_ms = ms;
        self
    }

    /// Build the service and spawn its router task.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Result<FileWatcherService, WatchError> {
        let (adapter, rx) = WatchAdapter::new(self.channel_capacity)?;

        let registry = Arc::new(RwLock::new(ContainerRegistry::new()));
        let adapter = Arc::new(Mutex::new(adapter));
        let broadcaster = ChangeBroadcaster::new(self.broadcast_capacity);
        let shutdown = CancellationToken::new();

        let router = EventRouter::new(
            registry.clone(),
            adapter.clone(),
            broadcaster.clone(),
            rx,
            self.debounce_ms,
            self.retry_interval_ms,
            shutdown.clone(),
        );
        tokio::spawn(router.run());

        Ok(FileWatcherService {
            registry,
            adapter,
            broadcaster,
            shutdown,
        })
    }
}

impl Default for FileWatcherServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
