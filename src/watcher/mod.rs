//! Workspace file-change notification service.
//!
//! Watches a dynamic, overlapping set of directory trees on behalf of
//! multiple independently-lifecycled containers (solutions/workspaces)
//! and emits deduplicated, precisely-scoped change/removal events.
//!
//! # Architecture
//!
//! ```text
//! FileWatcherService
//!   - ContainerRegistry (files + reverse ownership index, ad-hoc set)
//!   - WatchAdapter (one notify::RecommendedWatcher, minimal root set)
//!   - EventRouter task (coalescing + per-cycle batch dispatch)
//!         |
//!   ChangeBroadcaster --> subscriber receivers
//! ```
//!
//! Registry mutations recompute the minimal watch-root set; native
//! events flow adapter -> debouncer -> router -> broadcast batches.

mod adapter;
mod broadcast;
mod debouncer;
mod error;
mod event;
mod paths;
mod registry;
mod router;
mod service;

pub use adapter::WatchAdapter;
pub use broadcast::{ChangeBroadcaster, FileEvent};
pub use debouncer::Debouncer;
pub use error::WatchError;
pub use event::{RawEvent, RawEventKind};
pub use paths::{normalize_path, normalize_roots};
pub use registry::{ContainerId, ContainerRegistry};
pub use service::{FileWatcherService, FileWatcherServiceBuilder, WatcherStats};
