pub mod config;
pub mod logging;
pub mod watcher;

pub use config::Settings;
pub use watcher::{
    ContainerId, FileEvent, FileWatcherService, FileWatcherServiceBuilder, WatchError,
    WatcherStats,
};
