//! Streaming channel counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of what the streaming channel did with the chunks it was given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingStatistics {
    /// Chunks handed to a connected channel.
    pub sent_chunks: u64,

    /// Chunks dropped because the channel was not connected.
    pub dropped_chunks: u64,

    /// Media bytes handed to the channel.
    pub bytes_sent: u64,
}

/// Lock-free counters behind [`StreamingStatistics`].
#[derive(Debug, Default)]
pub(crate) struct StatisticsCollector {
    sent_chunks: AtomicU64,
    dropped_chunks: AtomicU64,
    bytes_sent: AtomicU64,
}

impl StatisticsCollector {
    pub(crate) fn record_sent(&self, bytes: u64) {
        self.sent_chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self) {
        self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.sent_chunks.store(0, Ordering::Relaxed);
        self.dropped_chunks.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StreamingStatistics {
        StreamingStatistics {
            sent_chunks: self.sent_chunks.load(Ordering::Relaxed),
            dropped_chunks: self.dropped_chunks.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}
