//! Byte counters for a running batch

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative bytes written across every file of a batch
#[derive(Debug)]
pub struct ProgressTracker {
    batch_total: u64,
    batch_bytes: AtomicU64,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(batch_total: u64) -> Self {
        Self {
            batch_total,
            batch_bytes: AtomicU64::new(0),
        }
    }

    /// Add `bytes` and return the new batch total
    pub fn record(&self, bytes: u64) -> u64 {
        self.batch_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    #[must_use]
    pub fn batch_total(&self) -> u64 {
        self.batch_total
    }
}
