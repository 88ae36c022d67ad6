//! Transfer requests and their results

use std::path::PathBuf;

use hubcas_errors::TransferError;

use crate::{AccessCredential, ContentDescriptor};

/// Batch of descriptors to materialize under one destination directory
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub descriptors: Vec<ContentDescriptor>,
    pub destination_dir: PathBuf,
    pub credential: AccessCredential,
}

impl TransferRequest {
    pub fn new(
        descriptors: Vec<ContentDescriptor>,
        destination_dir: impl Into<PathBuf>,
        credential: AccessCredential,
    ) -> Self {
        Self {
            descriptors,
            destination_dir: destination_dir.into(),
            credential,
        }
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.descriptors.iter().map(|d| d.size).sum()
    }
}

/// Local paths, index-aligned with the request's descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferResult {
    pub paths: Vec<PathBuf>,
}

/// Per-index outcome when partial success was requested
#[derive(Debug, Clone, Default)]
pub struct PartialTransferResult {
    pub outcomes: Vec<Result<PathBuf, TransferError>>,
}

impl PartialTransferResult {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&TransferError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err()).collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }
}
