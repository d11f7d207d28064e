//! Per-channel publish and delivery counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a channel
#[derive(Debug, Default)]
pub(crate) struct ChannelCounters {
    messages_published: AtomicU64,
    bytes_published: AtomicU64,
    messages_delivered: AtomicU64,
    messages_dropped: AtomicU64,
}

impl ChannelCounters {
    pub fn record_publish(&self, bytes: u64) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_delivery(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a channel's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Messages accepted from publishers
    pub messages_published: u64,
    /// Total payload bytes accepted from publishers
    pub bytes_published: u64,
    /// Per-subscriber deliveries enqueued or completed
    pub messages_delivered: u64,
    /// Per-subscriber deliveries dropped by backpressure
    pub messages_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = ChannelCounters::default();
        counters.record_publish(5);
        counters.record_publish(11);
        counters.record_delivery();
        counters.record_drop();

        let stats = counters.snapshot();
        assert_eq!(stats.messages_published, 2);
        assert_eq!(stats.bytes_published, 16);
        assert_eq!(stats.messages_delivered, 1);
        assert_eq!(stats.messages_dropped, 1);
    }
}
