//! Error types for the file watcher service.

use std::path::PathBuf;
use thiserror::Error;

use super::registry::ContainerId;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Cannot watch {path}: {reason}")]
    WatchUnavailable { path: PathBuf, reason: String },

    #[error("Unknown container handle {id}")]
    UnknownContainer { id: ContainerId },

    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
