//! Batch broadcasting to subscribers.
//!
//! Subscribers hold a broadcast receiver and drain it on their own
//! execution context; the router never blocks on, or even sees, a slow
//! subscriber. One lagging receiver cannot affect another.

use std::path::PathBuf;
use tokio::sync::broadcast;

/// One deduplicated batch delivered to subscribers.
///
/// Within a batch no path appears twice. Batches for the same subscriber
/// arrive in the order their triggering raw events were observed.
#[derive(Debug, Clone)]
pub enum FileEvent {
    /// Files created or modified.
    Changed { paths: Vec<PathBuf> },
    /// Files deleted (including files swept away with their directory).
    Removed { paths: Vec<PathBuf> },
}

/// Fans dispatch batches out to all subscribers.
#[derive(Clone)]
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<FileEvent>,
}

impl ChangeBroadcaster {
    /// Create a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send a batch to all subscribers. Fire-and-forget.
    pub fn send(&self, event: FileEvent) {
        match self.sender.send(event) {
            Ok(count) => {
                crate::debug_event!("broadcast", "sent batch", "{count} subscribers");
            }
            Err(_) => {
                // No receivers, this is fine
                crate::debug_event!("broadcast", "dropped batch", "no subscribers");
            }
        }
    }

    /// Subscribe to receive dispatch batches.
    pub fn subscribe(&self) -> broadcast::Receiver<FileEvent> {
        self.sender.subscribe()
    }
}
