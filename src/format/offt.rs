// Fixed-width signed integer encoding for the patch container ("offts").
//
// Every numeric field in a BSDIFF4/BSDF2 patch is a signed 64-bit integer
// stored in 8 bytes as sign-and-magnitude, NOT two's complement:
//
//   - magnitude occupies the low 63 bits, little-endian across the 8 bytes
//   - the sign lives in bit 7 of byte 7
//
// Byte-for-byte compatible with bsdiff's `offtout`/`offtin`. The layout is
// a hard wire-format invariant: two's complement would round-trip locally
// but silently corrupt patches exchanged with other implementations.

use std::io::{self, Read};

/// Encoded width of one integer field.
pub const OFFT_SIZE: usize = 8;

/// Encode a signed 64-bit integer into its 8-byte wire form.
///
/// The representable range is `-(2^63 - 1) ..= 2^63 - 1`; `i64::MIN` has no
/// sign-and-magnitude form because its magnitude needs bit 63. No field in a
/// well-formed patch can reach it.
#[inline]
pub fn encode_int64(n: i64) -> [u8; OFFT_SIZE] {
    debug_assert!(n != i64::MIN, "i64::MIN is not representable");
    let mut bytes = n.unsigned_abs().to_le_bytes();
    if n < 0 {
        bytes[7] |= 0x80;
    }
    bytes
}

/// Decode an 8-byte wire integer.
///
/// Masks out the sign bit to recover the magnitude, then negates if the sign
/// bit was set.
#[inline]
pub fn decode_int64(bytes: &[u8; OFFT_SIZE]) -> i64 {
    let mut raw = *bytes;
    let negative = raw[7] & 0x80 != 0;
    raw[7] &= 0x7F;
    let magnitude = u64::from_le_bytes(raw) as i64;
    if negative { -magnitude } else { magnitude }
}

/// Read one wire integer from a streaming source.
pub fn read_int64<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; OFFT_SIZE];
    r.read_exact(&mut buf)?;
    Ok(decode_int64(&buf))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
