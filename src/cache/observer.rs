//! Live subscriptions to a single cache key.

use tokio::sync::watch;

use super::entry::QueryValue;
use super::keys::CacheKey;

/// Observes every value committed under one key.
///
/// While an observer is alive its entry is never dropped by the evict timer.
/// Dropping the observer unsubscribes it; results that land afterwards are not
/// delivered anywhere.
pub struct QueryObserver {
    key: CacheKey,
    receiver: watch::Receiver<Option<QueryValue>>,
}

impl QueryObserver {
    pub(crate) fn new(key: CacheKey, receiver: watch::Receiver<Option<QueryValue>>) -> Self {
        Self { key, receiver }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest value seen for the key, if any was committed.
    pub fn current(&self) -> Option<QueryValue> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next committed value.
    ///
    /// Returns `None` once the owning cache has been dropped.
    pub async fn changed(&mut self) -> Option<QueryValue> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }
}
