mod local;
mod memory;

pub use local::{FileChunkSource, StdinChunkSource};
pub use memory::MemoryChunkSource;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Default read size for file and stdin sources.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Trait for pulling byte chunks from an input stream.
///
/// Chunk boundaries carry no meaning: the rewriter reassembles records that
/// straddle them, so a source may hand out bytes in whatever sizes its
/// transport produces.
#[async_trait]
pub trait ChunkSource: Send {
    /// Read the next chunk, or `None` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}
