//! Byte-range units of a transfer

use crate::ContentDescriptor;

/// One contiguous byte range of a descriptor, fetched as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHandle {
    pub descriptor: ContentDescriptor,
    pub offset: u64,
    pub length: u32,
}

impl ChunkHandle {
    /// Split a descriptor into consecutive ranges of at most `chunk_size`
    /// bytes. A zero-size descriptor yields no chunks.
    #[must_use]
    pub fn partition(descriptor: &ContentDescriptor, chunk_size: u32) -> Vec<ChunkHandle> {
        let step = u64::from(chunk_size.max(1));
        let mut chunks = Vec::new();
        let mut offset = 0u64;
        while offset < descriptor.size {
            let remaining = descriptor.size - offset;
            // remaining.min(step) <= chunk_size, so the conversion cannot fail
            let length = u32::try_from(remaining.min(step)).unwrap_or(chunk_size);
            chunks.push(ChunkHandle {
                descriptor: descriptor.clone(),
                offset,
                length,
            });
            offset += u64::from(length);
        }
        chunks
    }

    /// Exclusive end offset
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.length)
    }

    /// Value for an HTTP `Range` header (inclusive end)
    #[must_use]
    pub fn range_header(&self) -> String {
        format!(
            "bytes={}-{}",
            self.offset,
            self.end().saturating_sub(1).max(self.offset)
        )
    }
}
