//! Streaming archive rewriter.
//!
//! [`ZipTransformer`] takes a ZIP archive as a sequence of arbitrarily-sized
//! input chunks and re-emits it record by record, giving an [`EntryPolicy`]
//! the chance to replace or remove individual entries along the way. The
//! archive is never buffered whole; only the payload of an entry under
//! transformation is held in memory, and only until its replacement is
//! emitted.
//!
//! ## Rewriting strategy
//!
//! Input bytes accumulate in a reassembly buffer. At each record boundary
//! the parser either yields a complete record or reports that more input is
//! needed, in which case the held-over bytes wait for the next chunk. Each
//! entry's payload follows its local header and is consumed by byte count,
//! so chunk boundaries never need to line up with anything.
//!
//! Passthrough entries are copied out as they arrive. A transformed entry
//! is buffered, decompressed, handed to the policy, recompressed, and
//! emitted as one header+payload unit with recomputed CRC and sizes; its
//! trailing data descriptor (if any) is suppressed since the sizes are now
//! in the header. The central directory records that trail the entries are
//! patched against the offsets and attributes observed on the output side,
//! and the EOCD summary is rewritten last.
//!
//! Each pass owns its offset counters and lookup tables; independent passes
//! share nothing but the CRC table and may run concurrently.

use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::io::ChunkSource;

use super::codec;
use super::crc32::crc32;
use super::parser::{Parse, Record, parse_record};
use super::structures::{
    CentralDirectoryRecord, DataDescriptor, EndOfCentralDirectory, LocalFileHeader,
    TransformedAttributes,
};

/// What to do with an entry, decided from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Copy the entry through untouched.
    Keep,
    /// Buffer and decompress the payload, then ask the policy's
    /// `transform` what to do with it.
    Transform,
}

/// Result of transforming an entry's uncompressed content.
pub enum Outcome {
    /// Emit the entry with this content in place of the original.
    Replace(Vec<u8>),
    /// Drop the entry entirely: no header, payload, or directory record.
    Remove,
}

impl Outcome {
    /// Replace with UTF-8 text.
    pub fn text(text: impl Into<String>) -> Self {
        Outcome::Replace(text.into().into_bytes())
    }
}

/// Per-entry decisions for one rewriting pass.
///
/// `inspect` is called once per entry in stream order. Entries it claims
/// with [`Action::Transform`] are decompressed and handed to `transform`;
/// everything else streams through byte for byte. `close` runs exactly once
/// after the final record, so a policy backed by an external resource (a
/// value generator, say) can release it.
///
/// Entry names use `/` as the path separator. Names are assumed unique
/// within an archive; with duplicates, the last header wins in the offset
/// bookkeeping.
#[async_trait]
pub trait EntryPolicy: Send {
    fn inspect(&mut self, name: &str) -> Result<Action>;

    async fn transform(&mut self, name: &str, data: Vec<u8>) -> Result<Outcome> {
        let _ = name;
        Ok(Outcome::Replace(data))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A policy that keeps every entry untouched.
pub struct NoopPolicy;

#[async_trait]
impl EntryPolicy for NoopPolicy {
    fn inspect(&mut self, _name: &str) -> Result<Action> {
        Ok(Action::Keep)
    }
}

/// Counters reported after a completed pass.
#[derive(Debug, Clone, Copy)]
pub struct PassSummary {
    /// Local file headers seen in the input.
    pub entries: usize,
    /// Entries whose content was replaced.
    pub transformed: usize,
    /// Entries removed from the archive.
    pub removed: usize,
    /// Total bytes emitted.
    pub bytes_written: u64,
}

/// Payload accumulator for the single entry currently under transformation.
struct Extraction {
    header: LocalFileHeader,
    data: Vec<Bytes>,
}

/// Push-based rewriting state machine.
///
/// Feed input with [`push`](Self::push), drain emitted chunks with
/// [`take_output`](Self::take_output), and call [`finish`](Self::finish)
/// after the last chunk. [`modify_zip`] wraps this in a ready-made pump.
pub struct ZipTransformer<'a, P: EntryPolicy> {
    policy: &'a mut P,
    /// Held-over input bytes that do not yet form a complete record.
    pending: BytesMut,
    /// Payload bytes still owed to the current entry.
    data_remaining: u64,
    extraction: Option<Extraction>,
    /// Set while rewriting a transformed entry, whose descriptor is
    /// superseded by the patched header.
    omit_descriptor: bool,
    /// Byte position in the output stream.
    current_offset: u64,
    /// Entry name -> local header offset in the output.
    local_offsets: HashMap<String, u32>,
    /// Entry name -> recomputed attributes, for directory patching.
    transformed: HashMap<String, TransformedAttributes>,
    directory_offset: u32,
    directory_size: u32,
    directory_count: u16,
    saw_eocd: bool,
    entries: usize,
    transformed_count: usize,
    removed: usize,
    out: Vec<Bytes>,
}

impl<'a, P: EntryPolicy> ZipTransformer<'a, P> {
    pub fn new(policy: &'a mut P) -> Self {
        Self {
            policy,
            pending: BytesMut::new(),
            data_remaining: 0,
            extraction: None,
            omit_descriptor: false,
            current_offset: 0,
            local_offsets: HashMap::new(),
            transformed: HashMap::new(),
            directory_offset: 0,
            directory_size: 0,
            directory_count: 0,
            saw_eocd: false,
            entries: 0,
            transformed_count: 0,
            removed: 0,
            out: Vec::new(),
        }
    }

    /// Feed the next input chunk, advancing the state machine as far as the
    /// buffered bytes allow.
    pub async fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(chunk);
        loop {
            if self.data_remaining > 0 {
                if self.pending.is_empty() {
                    break;
                }
                let take = self.pending.len().min(self.data_remaining as usize);
                let data = self.pending.split_to(take).freeze();
                self.data_remaining -= take as u64;
                if let Some(extraction) = &mut self.extraction {
                    extraction.data.push(data);
                    if self.data_remaining == 0 {
                        if let Some(extraction) = self.extraction.take() {
                            self.finish_extraction(extraction).await?;
                        }
                    }
                } else {
                    self.emit(data);
                }
                continue;
            }

            if self.pending.is_empty() {
                break;
            }
            let record = match parse_record(&self.pending)? {
                Parse::Incomplete => break,
                Parse::Done(record) => record,
            };
            self.pending.advance(record.len());
            match record {
                Record::Local(header) => self.handle_local_header(header).await?,
                Record::Descriptor(descriptor) => self.handle_descriptor(descriptor),
                Record::Central(record) => self.handle_central_record(record)?,
                Record::End(eocd) => self.handle_eocd(eocd),
            }
        }
        Ok(())
    }

    /// Drain the chunks emitted so far.
    pub fn take_output(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.out)
    }

    /// Declare end of input: verify the archive completed cleanly, run the
    /// policy's `close` hook, and report pass counters.
    pub async fn finish(&mut self) -> Result<PassSummary> {
        if self.data_remaining > 0 || self.extraction.is_some() || !self.pending.is_empty() {
            bail!("Unexpected end of archive");
        }
        if !self.saw_eocd {
            bail!("Archive ended without an end-of-central-directory record");
        }
        self.policy.close().await?;
        Ok(PassSummary {
            entries: self.entries,
            transformed: self.transformed_count,
            removed: self.removed,
            bytes_written: self.current_offset,
        })
    }

    fn emit(&mut self, data: Bytes) {
        self.current_offset += data.len() as u64;
        self.out.push(data);
    }

    fn offset32(&self) -> Result<u32> {
        u32::try_from(self.current_offset).context("Output offset exceeds the ZIP32 limit")
    }

    async fn handle_local_header(&mut self, header: LocalFileHeader) -> Result<()> {
        self.entries += 1;
        self.data_remaining = u64::from(header.compressed_size);
        debug!(
            name = %header.name,
            compressed = header.compressed_size,
            "local file header"
        );
        match self.policy.inspect(&header.name)? {
            Action::Transform => {
                self.omit_descriptor = true;
                let extraction = Extraction { header, data: Vec::new() };
                if self.data_remaining == 0 {
                    self.finish_extraction(extraction).await?;
                } else {
                    self.extraction = Some(extraction);
                }
            }
            Action::Keep => {
                self.omit_descriptor = false;
                let offset = self.offset32()?;
                self.local_offsets.insert(header.name.clone(), offset);
                self.emit(Bytes::from(header.into_raw()));
            }
        }
        Ok(())
    }

    fn handle_descriptor(&mut self, descriptor: DataDescriptor) {
        if !self.omit_descriptor {
            self.emit(Bytes::from(descriptor.into_raw()));
        }
    }

    /// Decompress a fully-buffered payload, apply the transform, and emit
    /// the patched header plus recompressed payload as one unit (or nothing,
    /// for a removed entry).
    async fn finish_extraction(&mut self, extraction: Extraction) -> Result<()> {
        let Extraction { mut header, data } = extraction;
        let mut compressed = Vec::with_capacity(header.compressed_size as usize);
        for piece in &data {
            compressed.extend_from_slice(piece);
        }
        let uncompressed = codec::decompress(&compressed, header.compression)?;

        match self.policy.transform(&header.name, uncompressed).await? {
            Outcome::Replace(new_data) => {
                let compressed = codec::compress(&new_data, header.compression)?;
                let attrs = TransformedAttributes {
                    crc32: crc32(&new_data),
                    compressed_size: u32::try_from(compressed.len())
                        .context("Transformed payload exceeds the ZIP32 limit")?,
                    uncompressed_size: u32::try_from(new_data.len())
                        .context("Transformed payload exceeds the ZIP32 limit")?,
                };
                self.transformed.insert(header.name.clone(), attrs);
                self.local_offsets.insert(header.name.clone(), self.offset32()?);
                header.patch_transformed(&attrs);
                self.transformed_count += 1;
                debug!(
                    name = %header.name,
                    compressed = attrs.compressed_size,
                    uncompressed = attrs.uncompressed_size,
                    "replaced entry content"
                );
                self.emit(Bytes::from(header.into_raw()));
                self.emit(Bytes::from(compressed));
            }
            Outcome::Remove => {
                self.removed += 1;
                debug!(name = %header.name, "removed entry");
            }
        }
        Ok(())
    }

    fn handle_central_record(&mut self, mut record: CentralDirectoryRecord) -> Result<()> {
        // An entry with no retained local header was removed; its directory
        // record goes with it and the running counts stay consistent.
        let Some(&offset) = self.local_offsets.get(&record.name) else {
            debug!(name = %record.name, "dropped directory record");
            return Ok(());
        };
        record.patch_local_header_offset(offset);
        if let Some(attrs) = self.transformed.get(&record.name) {
            record.patch_transformed(attrs);
        }
        if self.directory_count == 0 {
            self.directory_offset = self.offset32()?;
        }
        self.directory_count = self
            .directory_count
            .checked_add(1)
            .context("Central directory record count exceeds the ZIP32 limit")?;
        self.directory_size = self
            .directory_size
            .checked_add(record.len() as u32)
            .context("Central directory size exceeds the ZIP32 limit")?;
        self.emit(Bytes::from(record.into_raw()));
        Ok(())
    }

    fn handle_eocd(&mut self, mut eocd: EndOfCentralDirectory) {
        eocd.patch_directory(self.directory_count, self.directory_size, self.directory_offset);
        self.saw_eocd = true;
        self.emit(Bytes::from(eocd.into_raw()));
    }
}

/// Rewrite an archive from `source` into `sink` under `policy`.
///
/// Output is produced lazily as input arrives; awaiting the sink's writes is
/// what paces the pass, so a slow consumer throttles the whole pipeline.
pub async fn modify_zip<S, P, W>(source: &mut S, policy: &mut P, sink: &mut W) -> Result<PassSummary>
where
    S: ChunkSource + ?Sized,
    P: EntryPolicy,
    W: AsyncWrite + Unpin,
{
    let mut transformer = ZipTransformer::new(policy);
    while let Some(chunk) = source.next_chunk().await? {
        transformer.push(&chunk).await?;
        for piece in transformer.take_output() {
            sink.write_all(&piece).await?;
        }
    }
    let summary = transformer.finish().await?;
    sink.flush().await?;
    info!(
        entries = summary.entries,
        transformed = summary.transformed,
        removed = summary.removed,
        bytes = summary.bytes_written,
        "rewrite pass complete"
    );
    Ok(summary)
}
