//! Content descriptors

use serde::{Deserialize, Serialize};

/// Immutable identity of one file's bytes in the content-addressed store.
///
/// Two descriptors with equal `hash` name identical bytes. `size` is used for
/// pre-allocation and for the length check after reassembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub hash: String,
    pub size: u64,
}

impl ContentDescriptor {
    pub fn new(hash: impl Into<String>, size: u64) -> Self {
        Self {
            hash: hash.into(),
            size,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl std::fmt::Display for ContentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} bytes)", self.hash, self.size)
    }
}
