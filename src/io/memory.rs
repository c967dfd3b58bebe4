use super::ChunkSource;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Chunked reader over an in-memory buffer.
///
/// `with_chunk_size` splits the buffer into fixed-size pieces, which makes
/// it easy to exercise record parsing across arbitrary chunk boundaries
/// (down to one byte at a time).
pub struct MemoryChunkSource {
    data: Bytes,
    chunk_size: usize,
}

impl MemoryChunkSource {
    /// Serve the whole buffer as a single chunk.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let chunk_size = data.len().max(1);
        Self { data, chunk_size }
    }

    /// Serve the buffer in chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            data: data.into(),
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl ChunkSource for MemoryChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let take = self.data.len().min(self.chunk_size);
        Ok(Some(self.data.split_to(take)))
    }
}
