//! Raw DEFLATE compression and decompression.
//!
//! ZIP method 8 is raw DEFLATE with no zlib or gzip wrapper, so the
//! `flate2` raw encoder/decoder types are used directly. Method 0 (stored)
//! passes bytes through unchanged.

use std::io::Write;

use anyhow::{Result, bail};
use flate2::Compression;
use flate2::write::{DeflateDecoder, DeflateEncoder};

use super::structures::CompressionMethod;

/// Compress a payload with the given ZIP compression method.
pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionMethod::Unknown(v) => {
            bail!("Unsupported compression method: {v}")
        }
    }
}

/// Decompress an entry payload with the given ZIP compression method.
pub fn decompress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut decoder = DeflateDecoder::new(Vec::new());
            decoder.write_all(data)?;
            Ok(decoder.finish()?)
        }
        CompressionMethod::Unknown(v) => {
            bail!("Unsupported compression method: {v}")
        }
    }
}
