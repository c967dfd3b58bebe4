//! Shared helpers: an independent reader for finished archives, so tests
//! verify output bytes without going through the code under test, plus a
//! hand-assembled archive that uses trailing data descriptors.
#![allow(dead_code)]

use byteorder::{ByteOrder, LittleEndian};
use flate2::write::DeflateDecoder;
use std::io::Write;

use rezip::zip::{EntryPolicy, PassSummary, modify_zip};
use rezip::MemoryChunkSource;

#[derive(Debug)]
pub struct DirEntry {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub lfh_offset: u32,
}

/// Walk the central directory of a finished archive (no trailing comment).
pub fn read_directory(archive: &[u8]) -> Vec<DirEntry> {
    let eocd = &archive[archive.len() - 22..];
    assert_eq!(&eocd[0..4], b"PK\x05\x06", "missing EOCD");
    let count = LittleEndian::read_u16(&eocd[10..12]) as usize;
    let mut pos = LittleEndian::read_u32(&eocd[16..20]) as usize;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        assert_eq!(&archive[pos..pos + 4], b"PK\x01\x02", "missing CDFH");
        let flags = LittleEndian::read_u16(&archive[pos + 8..pos + 10]);
        let name_len = LittleEndian::read_u16(&archive[pos + 28..pos + 30]) as usize;
        let extra_len = LittleEndian::read_u16(&archive[pos + 30..pos + 32]) as usize;
        let comment_len = LittleEndian::read_u16(&archive[pos + 32..pos + 34]) as usize;
        entries.push(DirEntry {
            name: String::from_utf8_lossy(&archive[pos + 46..pos + 46 + name_len]).to_string(),
            flags,
            method: LittleEndian::read_u16(&archive[pos + 10..pos + 12]),
            crc32: LittleEndian::read_u32(&archive[pos + 16..pos + 20]),
            compressed_size: LittleEndian::read_u32(&archive[pos + 20..pos + 24]),
            uncompressed_size: LittleEndian::read_u32(&archive[pos + 24..pos + 28]),
            lfh_offset: LittleEndian::read_u32(&archive[pos + 42..pos + 46]),
        });
        pos += 46 + name_len + extra_len + comment_len;
    }
    entries
}

/// Follow an entry's local header offset and decompress its payload.
pub fn entry_data(archive: &[u8], entry: &DirEntry) -> Vec<u8> {
    let pos = entry.lfh_offset as usize;
    assert_eq!(&archive[pos..pos + 4], b"PK\x03\x04", "offset does not hit a local header");
    let name_len = LittleEndian::read_u16(&archive[pos + 26..pos + 28]) as usize;
    let extra_len = LittleEndian::read_u16(&archive[pos + 28..pos + 30]) as usize;
    let start = pos + 30 + name_len + extra_len;
    let data = &archive[start..start + entry.compressed_size as usize];
    match entry.method {
        0 => data.to_vec(),
        8 => {
            let mut decoder = DeflateDecoder::new(Vec::new());
            decoder.write_all(data).unwrap();
            decoder.finish().unwrap()
        }
        m => panic!("unexpected compression method {m}"),
    }
}

pub fn find_entry<'a>(entries: &'a [DirEntry], name: &str) -> &'a DirEntry {
    entries
        .iter()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("entry {name} not in directory"))
}

/// Run one rewriting pass over an in-memory archive.
pub async fn rewrite(
    archive: &[u8],
    policy: &mut impl EntryPolicy,
    chunk_size: usize,
) -> (Vec<u8>, PassSummary) {
    let mut source = MemoryChunkSource::with_chunk_size(archive.to_vec(), chunk_size);
    let mut out = Vec::new();
    let summary = modify_zip(&mut source, policy, &mut out).await.unwrap();
    (out, summary)
}

/// Hand-assemble a one-entry archive whose header sets flag bit 3 and is
/// followed by a 16-byte data descriptor, the way some streaming writers
/// emit entries even when the header sizes are filled in.
pub fn descriptor_archive(name: &str, payload: &[u8]) -> Vec<u8> {
    let crc = rezip::zip::crc32(payload);
    let flags: u16 = 0x0008 | 0x0800;
    let mut out = Vec::new();

    let lfh_offset = out.len() as u32;
    out.extend_from_slice(b"PK\x03\x04");
    push_u16(&mut out, 20);
    push_u16(&mut out, flags);
    push_u16(&mut out, 0); // stored
    push_u32(&mut out, 0); // timestamp
    push_u32(&mut out, crc);
    push_u32(&mut out, payload.len() as u32);
    push_u32(&mut out, payload.len() as u32);
    push_u16(&mut out, name.len() as u16);
    push_u16(&mut out, 0);
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(payload);

    out.extend_from_slice(b"PK\x07\x08");
    push_u32(&mut out, crc);
    push_u32(&mut out, payload.len() as u32);
    push_u32(&mut out, payload.len() as u32);

    let cd_offset = out.len() as u32;
    out.extend_from_slice(b"PK\x01\x02");
    push_u16(&mut out, 20);
    push_u16(&mut out, 20);
    push_u16(&mut out, flags);
    push_u16(&mut out, 0);
    push_u32(&mut out, 0);
    push_u32(&mut out, crc);
    push_u32(&mut out, payload.len() as u32);
    push_u32(&mut out, payload.len() as u32);
    push_u16(&mut out, name.len() as u16);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u32(&mut out, 0);
    push_u32(&mut out, lfh_offset);
    out.extend_from_slice(name.as_bytes());
    let cd_size = out.len() as u32 - cd_offset;

    out.extend_from_slice(b"PK\x05\x06");
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u16(&mut out, 1);
    push_u16(&mut out, 1);
    push_u32(&mut out, cd_size);
    push_u32(&mut out, cd_offset);
    push_u16(&mut out, 0);
    out
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Count non-overlapping occurrences of a byte pattern.
pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}
