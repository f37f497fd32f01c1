//! Shared, read-mostly view of a book
//!
//! The processing loop owns the book; everything else sees it only through
//! this handle.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::OrderBookMetrics;

#[derive(Debug)]
struct Inner {
    warming_up: AtomicBool,
    channel_ids: RwLock<BTreeSet<u64>>,
    metrics: RwLock<Option<OrderBookMetrics>>,
    last_published: RwLock<Option<DateTime<Utc>>>,
}

/// Cloneable status handle for one book
#[derive(Debug, Clone)]
pub struct BookStatus {
    inner: Arc<Inner>,
}

impl Default for BookStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl BookStatus {
    /// New handle, warming up with no channels
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                warming_up: AtomicBool::new(true),
                channel_ids: RwLock::new(BTreeSet::new()),
                metrics: RwLock::new(None),
                last_published: RwLock::new(None),
            }),
        }
    }

    pub fn is_warming_up(&self) -> bool {
        self.inner.warming_up.load(Ordering::Acquire)
    }

    pub fn set_warming_up(&self, warming_up: bool) {
        self.inner.warming_up.store(warming_up, Ordering::Release);
    }

    /// Channel ids the exchange assigned to this symbol's subscriptions
    pub fn channel_ids(&self) -> Vec<u64> {
        self.inner.channel_ids.read().iter().copied().collect()
    }

    pub fn add_channel(&self, chan_id: u64) {
        self.inner.channel_ids.write().insert(chan_id);
    }

    pub fn remove_channel(&self, chan_id: u64) {
        self.inner.channel_ids.write().remove(&chan_id);
    }

    /// Forget every channel id. Ids are only valid on the socket that
    /// handed them out.
    pub fn clear_channels(&self) {
        self.inner.channel_ids.write().clear();
    }

    pub fn publish_metrics(&self, metrics: OrderBookMetrics) {
        *self.inner.metrics.write() = Some(metrics);
        *self.inner.last_published.write() = Some(Utc::now());
    }

    pub fn metrics(&self) -> Option<OrderBookMetrics> {
        self.inner.metrics.read().clone()
    }

    pub fn last_published(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_published.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status_is_warming_up() {
        let status = BookStatus::new();
        assert!(status.is_warming_up());
        assert!(status.channel_ids().is_empty());
        assert!(status.metrics().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let status = BookStatus::new();
        let observer = status.clone();

        status.set_warming_up(false);
        status.add_channel(42);
        status.add_channel(17);
        status.add_channel(42);

        assert!(!observer.is_warming_up());
        assert_eq!(observer.channel_ids(), vec![17, 42]);

        status.remove_channel(17);
        assert_eq!(observer.channel_ids(), vec![42]);

        status.add_channel(43);
        observer.clear_channels();
        assert!(status.channel_ids().is_empty());
    }

    #[test]
    fn test_publish_metrics() {
        let status = BookStatus::new();
        status.publish_metrics(OrderBookMetrics::default());
        assert!(status.metrics().is_some());
        assert!(status.last_published().is_some());
    }
}
