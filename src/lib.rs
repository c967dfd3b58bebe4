//! # rezip
//!
//! A streaming ZIP rewriter.
//!
//! This library rewrites ZIP archives on the fly: the archive flows through
//! as a byte stream in arbitrarily-sized chunks, selected entries can be
//! replaced or removed via a caller-supplied policy, and the output is a
//! structurally valid archive with all CRCs, sizes, and central directory
//! offsets kept consistent. No random access, seeking, or full in-memory
//! buffering of the archive is needed, which makes it suitable for piping
//! large archives through a transformation (for example, filling placeholder
//! text inside an OOXML document's XML parts).
//!
//! ## Features
//!
//! - Rewrite archives from any chunked byte source (file, stdin, memory)
//! - Replace or delete entries by name, with decompress/recompress handled
//!   transparently
//! - Build new archives from scratch with [`create_zip`]
//! - Backpressure-driven: a slow output consumer paces the whole pass
//!
//! ## Example
//!
//! ```no_run
//! use rezip::{Action, EntryPolicy, MemoryChunkSource, Outcome, modify_zip};
//! use anyhow::Result;
//! use async_trait::async_trait;
//!
//! struct Greeting;
//!
//! #[async_trait]
//! impl EntryPolicy for Greeting {
//!     fn inspect(&mut self, name: &str) -> Result<Action> {
//!         Ok(if name == "hello.txt" { Action::Transform } else { Action::Keep })
//!     }
//!
//!     async fn transform(&mut self, _name: &str, _data: Vec<u8>) -> Result<Outcome> {
//!         Ok(Outcome::text("Hello from rezip\n"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let archive = std::fs::read("archive.zip")?;
//!     let mut source = MemoryChunkSource::new(archive);
//!     let mut policy = Greeting;
//!     let mut output = Vec::new();
//!     let summary = modify_zip(&mut source, &mut policy, &mut output).await?;
//!     println!("{} entries, {} replaced", summary.entries, summary.transformed);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use io::{ChunkSource, FileChunkSource, MemoryChunkSource, StdinChunkSource};
pub use zip::{
    Action, EntryPolicy, EntrySpec, NoopPolicy, Outcome, PassSummary, ZipTransformer, ZipWriter,
    create_zip, modify_zip,
};
