//! ZIP archive rewriting and creation.
//!
//! This module implements a forward-only ZIP processor: it takes an archive
//! as a byte stream, rewrites it entry by entry, and keeps every header,
//! CRC, size, and central directory offset consistent even when entries are
//! replaced, resized, or removed along the way.
//!
//! ## Architecture
//!
//! - `structures`: Data structures for ZIP records (local file headers,
//!   data descriptors, central directory records, EOCD) with in-place
//!   patching of the fields a rewrite touches
//! - `parser`: Incremental parsing of records out of arbitrarily-chunked
//!   input, distinguishing "need more bytes" from "malformed"
//! - `modify`: The streaming rewriter and the [`EntryPolicy`] seam for
//!   caller-supplied content transforms
//! - `create`: A writer that produces a fresh archive from entry specs
//! - `crc32` and `codec`: Checksum and raw-DEFLATE primitives
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! A random-access reader starts from the EOCD; a streaming rewriter cannot,
//! so this implementation parses in file order and patches the trailing
//! directory from what it already emitted by the time the directory arrives.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) and DEFLATE methods for transformed entries;
//!   passthrough entries keep whatever method they came with
//! - Data descriptors (streamed through, or suppressed for transformed
//!   entries whose sizes become known)
//! - UTF-8 entry names per general purpose flag bit 11
//!
//! ## Limitations
//!
//! - No ZIP64 extensions (archives and offsets stay under 4GB)
//! - No encryption support
//! - No multi-disk archive support

mod codec;
mod create;
mod crc32;
mod modify;
mod parser;
mod structures;

pub use create::{EntrySpec, ZipWriter, create_zip};
pub use crc32::crc32;
pub use modify::{
    Action, EntryPolicy, NoopPolicy, Outcome, PassSummary, ZipTransformer, modify_zip,
};
pub use parser::{Parse, Record, parse_record};
pub use structures::*;
