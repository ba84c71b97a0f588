//! Media chunk type.

use bytes::Bytes;

/// One timer slice of captured media.
///
/// The sequence number is process-local bookkeeping; it never goes on the
/// wire, where arrival order alone defines the stream.
#[derive(Debug, Clone)]
pub struct MediaChunk {
    /// Opaque container bytes.
    pub data: Bytes,

    /// Monotonically increasing sequence number within one capture.
    pub sequence: u64,
}

impl MediaChunk {
    /// Create a new chunk.
    pub fn new(data: Bytes, sequence: u64) -> Self {
        Self { data, sequence }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the chunk carries no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_reports_payload_size() {
        let chunk = MediaChunk::new(Bytes::from_static(b"webm"), 3);
        assert_eq!(chunk.len(), 4);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.sequence, 3);

        assert!(MediaChunk::new(Bytes::new(), 0).is_empty());
    }
}
