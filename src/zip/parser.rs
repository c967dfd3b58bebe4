//! Incremental ZIP record parser.
//!
//! This module handles the binary parsing of ZIP records out of a buffer
//! that grows as input chunks arrive, with no alignment between chunk
//! boundaries and record boundaries.
//!
//! ## Parsing Strategy
//!
//! Unlike a random-access reader, a streaming rewriter must take the archive
//! in file order: local file headers and payloads first, then the central
//! directory, then the EOCD. At each record boundary the next four bytes are
//! a signature that selects the record type; the record's total length is
//! then derived from its fixed prefix plus the variable name/extra/comment
//! lengths declared inside it.
//!
//! A record can easily straddle chunk boundaries, so every parse has two
//! non-error outcomes: the record is complete, or more input is needed. The
//! short-read case is an expected condition, not a failure, and is modeled
//! as [`Parse::Incomplete`] rather than an error; genuinely malformed input
//! (bad signature at a record boundary) is an `Err`.

use byteorder::{ByteOrder, LittleEndian};

use anyhow::{Result, bail};

use super::structures::*;

/// Outcome of attempting to parse one record from buffered input.
///
/// `Incomplete` means the buffer ends before the record's declared length;
/// the caller keeps the bytes and retries once more input arrives.
#[derive(Debug)]
pub enum Parse<T> {
    Done(T),
    Incomplete,
}

/// A record recognized at the current parse position.
#[derive(Debug)]
pub enum Record {
    Local(LocalFileHeader),
    Descriptor(DataDescriptor),
    Central(CentralDirectoryRecord),
    End(EndOfCentralDirectory),
}

impl Record {
    /// Number of input bytes the record occupied.
    pub fn len(&self) -> usize {
        match self {
            Record::Local(h) => h.len(),
            Record::Descriptor(_) => DataDescriptor::SIZE,
            Record::Central(r) => r.len(),
            Record::End(e) => e.len(),
        }
    }
}

/// Parse the record starting at the front of `buf`.
///
/// Routes on the 4-byte signature: local file header, data descriptor,
/// central directory record, or end of central directory. Any other
/// signature at a record boundary means the archive is malformed.
pub fn parse_record(buf: &[u8]) -> Result<Parse<Record>> {
    if buf.len() < 4 {
        return Ok(Parse::Incomplete);
    }

    match &buf[0..4] {
        sig if sig == LocalFileHeader::SIGNATURE => parse_local_header(buf),
        sig if sig == DataDescriptor::SIGNATURE => parse_descriptor(buf),
        sig if sig == CentralDirectoryRecord::SIGNATURE => parse_central_record(buf),
        sig if sig == EndOfCentralDirectory::SIGNATURE => parse_eocd(buf),
        sig => bail!("Unknown record signature {:#010x}", LittleEndian::read_u32(sig)),
    }
}

fn parse_local_header(buf: &[u8]) -> Result<Parse<Record>> {
    if buf.len() < LocalFileHeader::FIXED_SIZE {
        return Ok(Parse::Incomplete);
    }
    let name_length = LittleEndian::read_u16(&buf[26..28]) as usize;
    let extra_length = LittleEndian::read_u16(&buf[28..30]) as usize;
    let total = LocalFileHeader::FIXED_SIZE + name_length + extra_length;
    if buf.len() < total {
        return Ok(Parse::Incomplete);
    }
    let header = LocalFileHeader::from_raw(buf[..total].to_vec())?;
    Ok(Parse::Done(Record::Local(header)))
}

fn parse_descriptor(buf: &[u8]) -> Result<Parse<Record>> {
    if buf.len() < DataDescriptor::SIZE {
        return Ok(Parse::Incomplete);
    }
    let descriptor = DataDescriptor::from_raw(buf[..DataDescriptor::SIZE].to_vec())?;
    Ok(Parse::Done(Record::Descriptor(descriptor)))
}

fn parse_central_record(buf: &[u8]) -> Result<Parse<Record>> {
    if buf.len() < CentralDirectoryRecord::FIXED_SIZE {
        return Ok(Parse::Incomplete);
    }
    let name_length = LittleEndian::read_u16(&buf[28..30]) as usize;
    let extra_length = LittleEndian::read_u16(&buf[30..32]) as usize;
    let comment_length = LittleEndian::read_u16(&buf[32..34]) as usize;
    let total = CentralDirectoryRecord::FIXED_SIZE + name_length + extra_length + comment_length;
    if buf.len() < total {
        return Ok(Parse::Incomplete);
    }
    let record = CentralDirectoryRecord::from_raw(buf[..total].to_vec())?;
    Ok(Parse::Done(Record::Central(record)))
}

fn parse_eocd(buf: &[u8]) -> Result<Parse<Record>> {
    if buf.len() < EndOfCentralDirectory::FIXED_SIZE {
        return Ok(Parse::Incomplete);
    }
    let comment_length = LittleEndian::read_u16(&buf[20..22]) as usize;
    let total = EndOfCentralDirectory::FIXED_SIZE + comment_length;
    if buf.len() < total {
        return Ok(Parse::Incomplete);
    }
    let eocd = EndOfCentralDirectory::from_raw(buf[..total].to_vec())?;
    Ok(Parse::Done(Record::End(eocd)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_header_bytes(name: &[u8]) -> Vec<u8> {
        let mut raw = vec![0u8; LocalFileHeader::FIXED_SIZE + name.len()];
        raw[0..4].copy_from_slice(LocalFileHeader::SIGNATURE);
        LittleEndian::write_u16(&mut raw[6..8], FLAG_UTF8_NAME);
        LittleEndian::write_u16(&mut raw[26..28], name.len() as u16);
        raw[LocalFileHeader::FIXED_SIZE..].copy_from_slice(name);
        raw
    }

    #[test]
    fn short_prefix_is_incomplete() {
        assert!(matches!(parse_record(b"PK").unwrap(), Parse::Incomplete));
        assert!(matches!(
            parse_record(&LocalFileHeader::SIGNATURE[..4]).unwrap(),
            Parse::Incomplete
        ));
    }

    #[test]
    fn header_with_truncated_name_is_incomplete() {
        let raw = local_header_bytes(b"dir/file.txt");
        // Cut inside the variable-length tail
        let outcome = parse_record(&raw[..raw.len() - 3]).unwrap();
        assert!(matches!(outcome, Parse::Incomplete));
    }

    #[test]
    fn complete_header_parses() {
        let raw = local_header_bytes(b"dir/file.txt");
        match parse_record(&raw).unwrap() {
            Parse::Done(Record::Local(header)) => {
                assert_eq!(header.name, "dir/file.txt");
                assert_eq!(header.len(), raw.len());
            }
            _ => panic!("expected a complete local header"),
        }
    }

    #[test]
    fn unknown_signature_is_fatal() {
        let err = parse_record(b"PK\x09\x09____________________").unwrap_err();
        assert!(err.to_string().contains("Unknown record signature"));
    }

    #[test]
    fn eocd_with_comment_needs_all_comment_bytes() {
        let mut raw = vec![0u8; EndOfCentralDirectory::FIXED_SIZE + 4];
        raw[0..4].copy_from_slice(EndOfCentralDirectory::SIGNATURE);
        LittleEndian::write_u16(&mut raw[20..22], 4);
        raw[22..].copy_from_slice(b"note");

        assert!(matches!(
            parse_record(&raw[..raw.len() - 1]).unwrap(),
            Parse::Incomplete
        ));
        assert!(matches!(
            parse_record(&raw).unwrap(),
            Parse::Done(Record::End(_))
        ));
    }
}
