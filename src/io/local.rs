use super::{ChunkSource, DEFAULT_CHUNK_SIZE};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, Stdin};

/// Chunked reader over a local file.
pub struct FileChunkSource {
    file: File,
    chunk_size: usize,
}

impl FileChunkSource {
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: File::open(path).await?,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub async fn open_with_chunk_size(path: &Path, chunk_size: usize) -> Result<Self> {
        Ok(Self {
            file: File::open(path).await?,
            chunk_size: chunk_size.max(1),
        })
    }
}

#[async_trait]
impl ChunkSource for FileChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        read_chunk(&mut self.file, self.chunk_size).await
    }
}

/// Chunked reader over standard input, for pipeline use.
pub struct StdinChunkSource {
    stdin: Stdin,
    chunk_size: usize,
}

impl StdinChunkSource {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            stdin: tokio::io::stdin(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for StdinChunkSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkSource for StdinChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        read_chunk(&mut self.stdin, self.chunk_size).await
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, size: usize) -> Result<Option<Bytes>> {
    let mut buf = vec![0u8; size];
    let n = reader.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some(Bytes::from(buf)))
}
