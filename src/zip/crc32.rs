//! Table-driven CRC-32 checksum (reflected, polynomial 0xEDB88320).
//!
//! Every entry payload written or rewritten by this crate gets its CRC
//! recomputed here so the value stored in the headers always matches the
//! bytes actually emitted.

use std::sync::OnceLock;

static CRC_TABLE: OnceLock<[u32; 256]> = OnceLock::new();

/// Build (once) and return the 256-entry lookup table.
///
/// The table is process-wide read-only state; `OnceLock` guarantees a single
/// initialization even when multiple passes run concurrently.
fn table() -> &'static [u32; 256] {
    CRC_TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (n, slot) in table.iter_mut().enumerate() {
            let mut c = n as u32;
            for _ in 0..8 {
                c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            }
            *slot = c;
        }
        table
    })
}

/// Compute the CRC-32 of a byte buffer.
pub fn crc32(data: &[u8]) -> u32 {
    let table = table();
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = (crc >> 8) ^ table[((crc ^ byte as u32) & 0xFF) as usize];
    }
    crc ^ 0xFFFF_FFFF
}
