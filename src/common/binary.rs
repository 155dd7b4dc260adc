//! Binary data parsing utilities shared across the container structures.
//!
//! The compound file format is little-endian throughout. These helpers decode
//! the few composite field types that show up in more than one structure:
//! packed sector-id arrays, UTF-16LE names, class ids and FILETIME stamps.

use chrono::{DateTime, Utc};
use encoding_rs::UTF_16LE;
use zerocopy::{FromBytes, LE, U16, U32};

/// FILETIME ticks (100 ns) between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

const TICKS_PER_SECOND: u64 = 10_000_000;

/// Decode a packed array of little-endian 32-bit sector ids.
///
/// Trailing bytes that do not form a whole entry are ignored.
///
/// # Examples
///
/// ```
/// use litchi_cfb::common::binary::read_sector_ids;
/// let data = [0x01, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF];
/// assert_eq!(read_sector_ids(&data), vec![1, 0xFFFF_FFFE]);
/// ```
pub fn read_sector_ids(data: &[u8]) -> Vec<u32> {
    let whole = data.len() - data.len() % 4;
    match <[U32<LE>]>::ref_from_bytes(&data[..whole]) {
        Ok(ids) => ids.iter().map(|id| id.get()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Decode a UTF-16LE byte run, dropping anything from the first NUL on.
///
/// Unpaired surrogates are replaced rather than rejected, since directory
/// names written by old tools are not always well-formed.
///
/// # Examples
///
/// ```
/// use litchi_cfb::common::binary::decode_utf16le;
/// let data = [b'R', 0, b'o', 0, b'o', 0, b't', 0, 0, 0, b'x', 0];
/// assert_eq!(decode_utf16le(&data), "Root");
/// ```
pub fn decode_utf16le(data: &[u8]) -> String {
    let (decoded, _) = UTF_16LE.decode_without_bom_handling(data);
    match decoded.find('\0') {
        Some(end) => decoded[..end].to_string(),
        None => decoded.into_owned(),
    }
}

/// Format a 16-byte class id as `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`.
///
/// An all-zero class id means "not set" and formats as an empty string.
pub fn format_clsid(bytes: &[u8; 16]) -> String {
    if bytes.iter().all(|&b| b == 0) {
        return String::new();
    }

    let data1 = U32::<LE>::read_from_bytes(&bytes[0..4])
        .map(|v| v.get())
        .unwrap_or(0);
    let data2 = U16::<LE>::read_from_bytes(&bytes[4..6])
        .map(|v| v.get())
        .unwrap_or(0);
    let data3 = U16::<LE>::read_from_bytes(&bytes[6..8])
        .map(|v| v.get())
        .unwrap_or(0);

    format!(
        "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        data1,
        data2,
        data3,
        bytes[8],
        bytes[9],
        bytes[10],
        bytes[11],
        bytes[12],
        bytes[13],
        bytes[14],
        bytes[15],
    )
}

/// Convert a FILETIME (100 ns units since 1601-01-01 UTC) to a UTC timestamp.
///
/// Returns `None` for `0`, which writers use for "not specified".
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    if filetime == 0 {
        return None;
    }

    let unix_ticks = filetime as i128 - FILETIME_UNIX_EPOCH as i128;
    let secs = unix_ticks.div_euclid(TICKS_PER_SECOND as i128) as i64;
    let nanos = (unix_ticks.rem_euclid(TICKS_PER_SECOND as i128) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}
