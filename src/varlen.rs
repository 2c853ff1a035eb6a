//! Variable-length quantities, as used for delta times and lengths in SMF files.
//!
//! Each byte holds 7 bits of the integer, most significant byte first, with the top bit set on
//! every byte except the last one.
//! At most 4 bytes are allowed, so the largest representable value is `2^28 - 1`.

use crate::prelude::*;

/// Maximum amount of bytes a varlen integer can take.
pub const MAX_LEN: usize = 4;

/// Decode a varlen integer starting at `raw[offset]`.
///
/// Returns the decoded value along with the amount of bytes consumed.
///
/// Fails with `Error::Truncated` if the buffer ends before a terminating byte (top bit clear)
/// is found, and with `Error::Format` if the integer is longer than 4 bytes.
pub fn decode_vlq(raw: &[u8], offset: usize) -> Result<(u32, usize)> {
    let bytes = raw.get(offset..).unwrap_or(&[]);
    let mut int: u32 = 0;
    for (i, &byte) in bytes.iter().take(MAX_LEN).enumerate() {
        int <<= 7;
        int |= (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((int, i + 1));
        }
    }
    if bytes.len() < MAX_LEN {
        bail!(err_truncated!(offset, "unexpected eof while reading varlen int"))
    } else {
        bail!(err_format!(offset, "varlen integer larger than 4 bytes"))
    }
}

/// Encode an integer as a varlen quantity.
///
/// Zero is encoded as a single zero byte.
/// Values above `2^28 - 1` cannot be represented and yield `Error::Range`.
pub fn encode_vlq(int: u32) -> Result<Vec<u8>> {
    let int = u28::try_from(int).ok_or(err_range!("varlen integer exceeds 28 bits"))?;
    let mut out = Vec::with_capacity(MAX_LEN);
    write_varlen(&mut out, int);
    Ok(out)
}

/// Append the varlen representation of `int` to `out`.
pub(crate) fn write_varlen(out: &mut Vec<u8>, int: u28) {
    let int = int.as_int();
    let mut skipping = true;
    for i in (0..MAX_LEN).rev() {
        let byte = ((int >> (i * 7)) & 0x7F) as u8;
        if skipping && byte == 0 && i != 0 {
            // Skip these leading zeros
        } else {
            skipping = false;
            let byte = if i == 0 {
                // Last byte
                byte
            } else {
                // Leading byte
                byte | 0x80
            };
            out.push(byte);
        }
    }
}

/// Write a slice as its varlen length followed by the raw bytes.
pub(crate) fn write_varlen_slice(out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .ok()
        .and_then(u28::try_from)
        .ok_or(err_range!("varlen slice exceeds 28 bits"))?;
    write_varlen(out, len);
    out.extend_from_slice(data);
    Ok(())
}
