//! services/api/src/adapters/feed.rs
//!
//! In-process change notifications that turn request/response stores into
//! snapshot subscriptions. Adapters publish a `Change` after every committed write;
//! watchers re-query the full result set when their topic changes.

use driverroom_core::ports::{PortResult, SnapshotStream};
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use uuid::Uuid;

/// The topic a committed write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Duty fields of someone in this company.
    Roster(Uuid),
    /// Return incidents of this company.
    Returns(Uuid),
    /// Messages of this chat.
    Chat(Uuid),
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: Change) {
        // No receivers simply means nobody is watching.
        let _ = self.sender.send(change);
    }

    /// A stream that yields `fetch()` immediately and again after every change to `topic`.
    ///
    /// The receiver is registered before the first fetch so no change can slip
    /// between the initial snapshot and the first notification.
    pub fn snapshots<T, F, Fut>(&self, topic: Change, fetch: F) -> SnapshotStream<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = PortResult<Vec<T>>> + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        Box::pin(async_stream::stream! {
            yield fetch().await;
            loop {
                match receiver.recv().await {
                    Ok(change) if change == topic => yield fetch().await,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Snapshot watcher for {:?} lagged by {} changes", topic, skipped);
                        yield fetch().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}
