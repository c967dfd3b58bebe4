//! Archive writer.
//!
//! Builds a well-formed ZIP from scratch: local headers and payloads in
//! entry order, then the central directory, then the EOCD summary. Sizes and
//! CRCs are computed before each header is written, so no entry ever needs a
//! trailing data descriptor.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use super::codec;
use super::crc32::crc32;
use super::structures::{
    CentralDirectoryRecord, CompressionMethod, EndOfCentralDirectory, FLAG_UTF8_NAME,
    LocalFileHeader, dos_datetime_now,
};

/// Payloads at or below this length are stored uncompressed; DEFLATE would
/// only add overhead.
const DEFLATE_THRESHOLD: usize = 32;

/// Version-needed-to-extract written into every header (2.0, plain DEFLATE).
const ZIP_VERSION: u16 = 20;

const INTERNAL_ATTR_TEXT: u16 = 0x0001;
const EXTERNAL_ATTR_FILE: u32 = 0x0080;
const EXTERNAL_ATTR_DIRECTORY: u32 = 0x0010;

/// One entry to be written into a new archive.
pub struct EntrySpec {
    pub name: String,
    pub data: Option<Vec<u8>>,
    pub comment: Option<String>,
    pub is_file: bool,
    pub is_text: bool,
}

impl EntrySpec {
    /// A regular file entry with the given content.
    pub fn file(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Some(data.into()),
            comment: None,
            is_file: true,
            is_text: false,
        }
    }

    /// A directory entry (no payload).
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
            comment: None,
            is_file: false,
            is_text: false,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Mark the entry as text in its internal attributes.
    pub fn text(mut self) -> Self {
        self.is_text = true;
        self
    }
}

/// Header fields remembered per entry until the central directory is written.
struct DirectoryEntry {
    flags: u16,
    compression: u16,
    last_modified: u32,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    internal_attributes: u16,
    external_attributes: u32,
    header_offset: u32,
    name: String,
    comment: Option<String>,
}

/// Incremental ZIP producer over any async byte sink.
///
/// Entries are written as they are added; `finish` emits the central
/// directory and EOCD and hands the sink back.
pub struct ZipWriter<W: AsyncWrite + Unpin> {
    sink: W,
    offset: u64,
    last_modified: u32,
    directory: Vec<DirectoryEntry>,
}

impl<W: AsyncWrite + Unpin> ZipWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            offset: 0,
            last_modified: dos_datetime_now(),
            directory: Vec::new(),
        }
    }

    /// Write one entry: compress the payload if it is worth it, emit its
    /// local header and bytes, and remember the fields the central directory
    /// will need.
    pub async fn add_entry(&mut self, entry: EntrySpec) -> Result<()> {
        let EntrySpec { name, data, comment, is_file, is_text } = entry;

        let crc32 = data.as_deref().map(crc32).unwrap_or(0);
        let method = match data.as_deref() {
            Some(d) if d.len() > DEFLATE_THRESHOLD => CompressionMethod::Deflate,
            _ => CompressionMethod::Stored,
        };
        let compressed = match data.as_deref() {
            Some(d) => Some(codec::compress(d, method)?),
            None => None,
        };

        let compressed_size = compressed
            .as_ref()
            .map(|d| u32::try_from(d.len()))
            .transpose()
            .context("Entry payload exceeds the ZIP32 limit")?
            .unwrap_or(0);
        let uncompressed_size = data
            .as_ref()
            .map(|d| u32::try_from(d.len()))
            .transpose()
            .context("Entry payload exceeds the ZIP32 limit")?
            .unwrap_or(0);
        let header_offset =
            u32::try_from(self.offset).context("Output offset exceeds the ZIP32 limit")?;

        let record = DirectoryEntry {
            flags: FLAG_UTF8_NAME,
            compression: method.as_u16(),
            last_modified: self.last_modified,
            crc32,
            compressed_size,
            uncompressed_size,
            internal_attributes: if is_text { INTERNAL_ATTR_TEXT } else { 0 },
            external_attributes: if is_file {
                EXTERNAL_ATTR_FILE
            } else {
                EXTERNAL_ATTR_DIRECTORY
            },
            header_offset,
            name,
            comment,
        };

        let mut header = Vec::with_capacity(LocalFileHeader::FIXED_SIZE + record.name.len());
        header.write_all(LocalFileHeader::SIGNATURE)?;
        header.write_u16::<LittleEndian>(ZIP_VERSION)?;
        header.write_u16::<LittleEndian>(record.flags)?;
        header.write_u16::<LittleEndian>(record.compression)?;
        header.write_u32::<LittleEndian>(record.last_modified)?;
        header.write_u32::<LittleEndian>(record.crc32)?;
        header.write_u32::<LittleEndian>(record.compressed_size)?;
        header.write_u32::<LittleEndian>(record.uncompressed_size)?;
        header.write_u16::<LittleEndian>(name_length(&record.name)?)?;
        header.write_u16::<LittleEndian>(0)?; // extra field length
        header.write_all(record.name.as_bytes())?;

        debug!(
            name = %record.name,
            method = record.compression,
            compressed = record.compressed_size,
            uncompressed = record.uncompressed_size,
            "writing entry"
        );

        self.write(&header).await?;
        if let Some(compressed) = &compressed {
            self.write(compressed).await?;
        }
        self.directory.push(record);
        Ok(())
    }

    /// Emit the central directory and EOCD, flush, and return the sink.
    pub async fn finish(mut self) -> Result<W> {
        let directory_offset =
            u32::try_from(self.offset).context("Output offset exceeds the ZIP32 limit")?;
        let record_count = u16::try_from(self.directory.len())
            .context("Central directory record count exceeds the ZIP32 limit")?;

        let directory = std::mem::take(&mut self.directory);
        for record in &directory {
            let comment = record.comment.as_deref().unwrap_or("");
            let mut header = Vec::with_capacity(
                CentralDirectoryRecord::FIXED_SIZE + record.name.len() + comment.len(),
            );
            header.write_all(CentralDirectoryRecord::SIGNATURE)?;
            header.write_u16::<LittleEndian>(ZIP_VERSION)?; // version made by
            header.write_u16::<LittleEndian>(ZIP_VERSION)?; // version needed
            header.write_u16::<LittleEndian>(record.flags)?;
            header.write_u16::<LittleEndian>(record.compression)?;
            header.write_u32::<LittleEndian>(record.last_modified)?;
            header.write_u32::<LittleEndian>(record.crc32)?;
            header.write_u32::<LittleEndian>(record.compressed_size)?;
            header.write_u32::<LittleEndian>(record.uncompressed_size)?;
            header.write_u16::<LittleEndian>(name_length(&record.name)?)?;
            header.write_u16::<LittleEndian>(0)?; // extra field length
            header.write_u16::<LittleEndian>(name_length(comment)?)?;
            header.write_u16::<LittleEndian>(0)?; // disk number start
            header.write_u16::<LittleEndian>(record.internal_attributes)?;
            header.write_u32::<LittleEndian>(record.external_attributes)?;
            header.write_u32::<LittleEndian>(record.header_offset)?;
            header.write_all(record.name.as_bytes())?;
            header.write_all(comment.as_bytes())?;
            self.write(&header).await?;
        }

        let directory_end =
            u32::try_from(self.offset).context("Output offset exceeds the ZIP32 limit")?;
        let mut eocd = Vec::with_capacity(EndOfCentralDirectory::FIXED_SIZE);
        eocd.write_all(EndOfCentralDirectory::SIGNATURE)?;
        eocd.write_u16::<LittleEndian>(0)?; // disk number
        eocd.write_u16::<LittleEndian>(0)?; // disk with central directory
        eocd.write_u16::<LittleEndian>(record_count)?;
        eocd.write_u16::<LittleEndian>(record_count)?;
        eocd.write_u32::<LittleEndian>(directory_end - directory_offset)?;
        eocd.write_u32::<LittleEndian>(directory_offset)?;
        eocd.write_u16::<LittleEndian>(0)?; // comment length
        self.write(&eocd).await?;

        tokio::io::AsyncWriteExt::flush(&mut self.sink).await?;
        info!(
            entries = directory.len(),
            bytes = self.offset,
            "archive complete"
        );
        Ok(self.sink)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        // Kept out of the module imports: AsyncWriteExt's write_u16/write_u32
        // would collide with byteorder's on the Vec<u8> header buffers.
        use tokio::io::AsyncWriteExt;

        self.sink.write_all(data).await?;
        self.offset += data.len() as u64;
        Ok(())
    }
}

fn name_length(s: &str) -> Result<u16> {
    u16::try_from(s.len()).context("Entry name or comment exceeds 65535 bytes")
}

/// Write a complete archive from an entry sequence into `sink`.
pub async fn create_zip<I, W>(entries: I, sink: W) -> Result<W>
where
    I: IntoIterator<Item = EntrySpec>,
    W: AsyncWrite + Unpin,
{
    let mut writer = ZipWriter::new(sink);
    for entry in entries {
        writer.add_entry(entry).await?;
    }
    writer.finish().await
}
