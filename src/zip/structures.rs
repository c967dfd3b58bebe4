use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};
use chrono::{Datelike, Local, Timelike};

/// General purpose flag bit 3: sizes deferred to a trailing data descriptor.
pub const FLAG_DEFERRED_SIZES: u16 = 0x0008;
/// General purpose flag bit 11: the entry name is UTF-8 encoded.
pub const FLAG_UTF8_NAME: u16 = 0x0800;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Decode an entry name per flag bit 11: UTF-8 when set, single-byte
/// characters otherwise.
pub(crate) fn decode_name(bytes: &[u8], flags: u16) -> String {
    if flags & FLAG_UTF8_NAME != 0 {
        String::from_utf8_lossy(bytes).to_string()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Local File Header (LFH) - 30 fixed bytes + name + extra field.
///
/// The raw header bytes are retained so that a passthrough entry can be
/// re-emitted byte for byte, and so a transformed entry's CRC and size
/// fields can be patched in place.
#[derive(Debug)]
pub struct LocalFileHeader {
    raw: Vec<u8>,
    pub flags: u16,
    pub compression: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: String,
}

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const FIXED_SIZE: usize = 30;

    /// Parse a complete header from its raw bytes (fixed part + name + extra).
    pub(crate) fn from_raw(raw: Vec<u8>) -> Result<Self> {
        if raw.len() < Self::FIXED_SIZE || &raw[0..4] != Self::SIGNATURE {
            bail!("Invalid Local File Header");
        }

        let mut cursor = Cursor::new(&raw[4..]);
        let _version = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression = cursor.read_u16::<LittleEndian>()?;
        let _last_modified = cursor.read_u32::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_length = cursor.read_u16::<LittleEndian>()? as usize;
        let _extra_length = cursor.read_u16::<LittleEndian>()?;

        if raw.len() < Self::FIXED_SIZE + name_length {
            bail!("Invalid Local File Header");
        }
        let name = decode_name(&raw[Self::FIXED_SIZE..Self::FIXED_SIZE + name_length], flags);

        Ok(Self {
            raw,
            flags,
            compression: CompressionMethod::from_u16(compression),
            crc32,
            compressed_size,
            uncompressed_size,
            name,
        })
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Rewrite CRC and size fields after a transform, clearing the
    /// deferred-sizes flag since all values are now known up front.
    pub fn patch_transformed(&mut self, attrs: &TransformedAttributes) {
        self.flags &= !FLAG_DEFERRED_SIZES;
        self.crc32 = attrs.crc32;
        self.compressed_size = attrs.compressed_size;
        self.uncompressed_size = attrs.uncompressed_size;
        LittleEndian::write_u16(&mut self.raw[6..8], self.flags);
        LittleEndian::write_u32(&mut self.raw[14..18], attrs.crc32);
        LittleEndian::write_u32(&mut self.raw[18..22], attrs.compressed_size);
        LittleEndian::write_u32(&mut self.raw[22..26], attrs.uncompressed_size);
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}

/// Data descriptor - 16 bytes (signature, CRC, compressed size,
/// uncompressed size), trailing an entry whose header set flag bit 3.
#[derive(Debug)]
pub struct DataDescriptor {
    raw: Vec<u8>,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";
    pub const SIZE: usize = 16;

    pub(crate) fn from_raw(raw: Vec<u8>) -> Result<Self> {
        if raw.len() != Self::SIZE || &raw[0..4] != Self::SIGNATURE {
            bail!("Invalid data descriptor");
        }
        Ok(Self { raw })
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}

/// Central Directory File Header (CDFH) - 46 fixed bytes + name + extra +
/// comment. Retains its raw bytes for in-place patching, like
/// [`LocalFileHeader`].
#[derive(Debug)]
pub struct CentralDirectoryRecord {
    raw: Vec<u8>,
    pub flags: u16,
    pub name: String,
}

impl CentralDirectoryRecord {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const FIXED_SIZE: usize = 46;

    pub(crate) fn from_raw(raw: Vec<u8>) -> Result<Self> {
        if raw.len() < Self::FIXED_SIZE || &raw[0..4] != Self::SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let flags = LittleEndian::read_u16(&raw[8..10]);
        let name_length = LittleEndian::read_u16(&raw[28..30]) as usize;
        if raw.len() < Self::FIXED_SIZE + name_length {
            bail!("Invalid Central Directory File Header");
        }
        let name = decode_name(&raw[Self::FIXED_SIZE..Self::FIXED_SIZE + name_length], flags);

        Ok(Self { raw, flags, name })
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Point the record at the (possibly relocated) local header position
    /// in the output stream.
    pub fn patch_local_header_offset(&mut self, offset: u32) {
        LittleEndian::write_u32(&mut self.raw[42..46], offset);
    }

    /// Rewrite flags, CRC and sizes to match a transformed entry.
    pub fn patch_transformed(&mut self, attrs: &TransformedAttributes) {
        self.flags &= !FLAG_DEFERRED_SIZES;
        LittleEndian::write_u16(&mut self.raw[8..10], self.flags);
        LittleEndian::write_u32(&mut self.raw[16..20], attrs.crc32);
        LittleEndian::write_u32(&mut self.raw[20..24], attrs.compressed_size);
        LittleEndian::write_u32(&mut self.raw[24..28], attrs.uncompressed_size);
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}

/// End of Central Directory (EOCD) - 22 fixed bytes + comment.
#[derive(Debug)]
pub struct EndOfCentralDirectory {
    raw: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const FIXED_SIZE: usize = 22;

    pub(crate) fn from_raw(raw: Vec<u8>) -> Result<Self> {
        if raw.len() < Self::FIXED_SIZE || &raw[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }
        Ok(Self { raw })
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Overwrite the directory summary with the accumulated output-side
    /// values. The record count is written twice (this disk and total).
    pub fn patch_directory(&mut self, record_count: u16, size: u32, offset: u32) {
        LittleEndian::write_u16(&mut self.raw[8..10], record_count);
        LittleEndian::write_u16(&mut self.raw[10..12], record_count);
        LittleEndian::write_u32(&mut self.raw[12..16], size);
        LittleEndian::write_u32(&mut self.raw[16..20], offset);
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}

/// Attributes recomputed for a transformed entry, held until the matching
/// central directory record streams past.
#[derive(Debug, Clone, Copy)]
pub struct TransformedAttributes {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

/// Pack a date and time into the DOS 32-bit timestamp layout used by ZIP
/// headers. Years before the DOS epoch clamp to 1980.
pub fn dos_datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> u32 {
    let year = (year.max(1980) - 1980) as u32;
    year << 25 | month << 21 | day << 16 | hour << 11 | minute << 5 | second >> 1
}

/// The current local time as a DOS timestamp.
pub fn dos_datetime_now() -> u32 {
    let now = Local::now();
    dos_datetime(
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
    )
}
