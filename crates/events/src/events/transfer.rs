use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Events emitted while a download request runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    BatchStarted {
        batch_id: String,
        descriptors: usize,
        /// Distinct hashes after deduplication
        unique_files: usize,
        total_bytes: u64,
    },

    FileStarted {
        index: usize,
        hash: String,
        size: u64,
        chunks: usize,
    },

    ChunkRetrying {
        hash: String,
        offset: u64,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },

    FileVerified { index: usize, hash: String },

    FileCommitted { index: usize, path: PathBuf },

    FileFailed {
        index: usize,
        hash: String,
        failure: FailureContext,
    },

    /// Cumulative byte counters, emitted after each written chunk
    Progress {
        hash: String,
        file_bytes: u64,
        file_total: u64,
        batch_bytes: u64,
        batch_total: u64,
    },

    /// Files already renamed into place were removed after a later commit failed
    RolledBack { removed: usize },

    BatchCompleted {
        batch_id: String,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },

    BatchFailed {
        batch_id: String,
        failure: FailureContext,
    },

    StagingSwept { dir: PathBuf, removed: usize },
}
