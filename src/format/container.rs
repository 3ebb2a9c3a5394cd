// Patch container serialization and parsing.
//
// On-disk layout (all integers are 8-byte sign-and-magnitude fields, see
// `offt`):
//
//   offset 0        magic block (8 bytes, see `header`)
//   offset 8        compressed-control length  N1
//   offset 16       compressed-diff length     N2
//   offset 24       destination length
//   offset 32       N1 bytes compressed control block
//   offset 32+N1    N2 bytes compressed diff block
//   offset 32+N1+N2 compressed extra block (rest of stream, length implicit)
//
// The decompressed control block is a sequence of 24-byte tuples; any
// remainder is corruption. Encoding is fully self-contained and streamable
// to any sequential sink; decoding buffers each section in full.

use std::io::{self, Read, Write};

use log::debug;

use crate::compress::Provider;

use super::header::{Format, PatchHeader};
use super::offt::{self, OFFT_SIZE};

/// Serialized size of one control tuple (3 integer fields).
pub const CONTROL_TUPLE_SIZE: usize = 3 * OFFT_SIZE;

// ---------------------------------------------------------------------------
// Control tuples
// ---------------------------------------------------------------------------

/// One reconstruction instruction: copy `copy_len` bytes from the diff
/// stream (added to source bytes), insert `extra_len` literal bytes from the
/// extra stream, then seek the source cursor by `seek` (may be negative).
///
/// Replay order is reconstruction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub copy_len: i64,
    pub extra_len: i64,
    pub seek: i64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for container encoding/decoding. Every failure is fatal to
/// the current operation; there is no partial-result or retry path.
#[derive(Debug)]
pub enum FormatError {
    /// Magic bytes do not match the expected format variant.
    MagicMismatch { expected: Format, found: [u8; 8] },
    /// Decompressed control block length is not a multiple of 24.
    CorruptControlBlock { len: usize },
    /// A compression provider rejected malformed compressed bytes.
    Decompression(String),
    /// Fewer bytes available than a declared length requires.
    Truncated,
    /// A header field holds an impossible value (e.g. a negative length).
    InvalidInput(String),
    /// I/O error from the underlying stream.
    Io(io::Error),
}

impl FormatError {
    /// Classify a read failure: clean EOF means a truncated container,
    /// anything else is a transport error.
    pub(crate) fn truncated(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MagicMismatch { expected, found } => {
                write!(f, "bad magic for {expected} patch: {found:02X?}")
            }
            Self::CorruptControlBlock { len } => {
                write!(
                    f,
                    "corrupt control block: {len} bytes is not a multiple of {CONTROL_TUPLE_SIZE}"
                )
            }
            Self::Decompression(msg) => write!(f, "decompression failed: {msg}"),
            Self::Truncated => write!(f, "truncated patch stream"),
            Self::InvalidInput(msg) => write!(f, "invalid patch: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FormatError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a patch to `w`.
///
/// All three sections are compressed with the single provider the format
/// variant selects for writing. The extra block's length is not recorded;
/// readers consume the rest of the stream.
pub fn write_patch<W: Write>(
    w: &mut W,
    dst_len: usize,
    control: &[Control],
    diff: &[u8],
    extra: &[u8],
    format: Format,
) -> Result<(), FormatError> {
    let header = PatchHeader::for_writing(format);
    let provider = format.write_provider();

    header.encode(w)?;

    let mut raw_control = Vec::with_capacity(control.len() * CONTROL_TUPLE_SIZE);
    for c in control {
        raw_control.extend_from_slice(&offt::encode_int64(c.copy_len));
        raw_control.extend_from_slice(&offt::encode_int64(c.extra_len));
        raw_control.extend_from_slice(&offt::encode_int64(c.seek));
    }

    let bcontrol = provider.compress(&raw_control)?;
    let bdiff = provider.compress(diff)?;
    let bextra = provider.compress(extra)?;

    debug!(
        "write {format} patch: {} tuples, sections {}/{}/{} bytes compressed, dst {dst_len}",
        control.len(),
        bcontrol.len(),
        bdiff.len(),
        bextra.len(),
    );

    w.write_all(&offt::encode_int64(as_field(bcontrol.len())?))?;
    w.write_all(&offt::encode_int64(as_field(bdiff.len())?))?;
    w.write_all(&offt::encode_int64(as_field(dst_len)?))?;
    w.write_all(&bcontrol)?;
    w.write_all(&bdiff)?;
    w.write_all(&bextra)?;
    Ok(())
}

fn as_field(len: usize) -> Result<i64, FormatError> {
    i64::try_from(len).map_err(|_| FormatError::InvalidInput(format!("length {len} overflows")))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// A fully decoded patch, ready for the patch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Length of the reconstructed destination.
    pub dst_len: usize,
    /// Control sequence, in replay order.
    pub control: Vec<Control>,
    /// Decompressed diff block.
    pub diff: Vec<u8>,
    /// Decompressed extra block.
    pub extra: Vec<u8>,
}

/// Header-only view of a patch: the three declared lengths plus the decoded
/// control sequence, without materializing the diff/extra payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInfo {
    /// Compressed control block length as declared in the header.
    pub control_len: usize,
    /// Compressed diff block length as declared in the header.
    pub diff_len: usize,
    /// Length of the reconstructed destination.
    pub dst_len: usize,
    /// Control sequence, in replay order.
    pub control: Vec<Control>,
}

/// Fully decode a patch stream.
pub fn read_patch<R: Read>(r: &mut R, format: Format) -> Result<Patch, FormatError> {
    let (header, info) = read_prelude(r, format)?;

    let bdiff = read_section(r, info.diff_len)?;
    let diff = decompress(header.providers[1], &bdiff)?;

    // The extra block runs to the end of the stream; its length is implicit.
    let mut bextra = Vec::new();
    r.read_to_end(&mut bextra)?;
    let extra = decompress(header.providers[2], &bextra)?;

    debug!(
        "read {format} patch: {} tuples, diff {} bytes, extra {} bytes, dst {}",
        info.control.len(),
        diff.len(),
        extra.len(),
        info.dst_len,
    );

    Ok(Patch {
        dst_len: info.dst_len,
        control: info.control,
        diff,
        extra,
    })
}

/// Decode only the header and control sequence, for inspecting a patch
/// without decompressing its payloads.
pub fn read_info<R: Read>(r: &mut R, format: Format) -> Result<PatchInfo, FormatError> {
    let (_, info) = read_prelude(r, format)?;
    Ok(info)
}

/// Shared front half of decoding: magic, length fields, control block.
fn read_prelude<R: Read>(
    r: &mut R,
    format: Format,
) -> Result<(PatchHeader, PatchInfo), FormatError> {
    let header = PatchHeader::decode(r, format)?;

    let control_len = read_len(r, "control block")?;
    let diff_len = read_len(r, "diff block")?;
    let dst_len = read_len(r, "destination")?;

    let bcontrol = read_section(r, control_len)?;
    let raw_control = decompress(header.providers[0], &bcontrol)?;
    if raw_control.len() % CONTROL_TUPLE_SIZE != 0 {
        return Err(FormatError::CorruptControlBlock {
            len: raw_control.len(),
        });
    }

    let control = raw_control
        .chunks_exact(CONTROL_TUPLE_SIZE)
        .map(|chunk| Control {
            copy_len: offt::decode_int64(chunk[..8].try_into().unwrap()),
            extra_len: offt::decode_int64(chunk[8..16].try_into().unwrap()),
            seek: offt::decode_int64(chunk[16..24].try_into().unwrap()),
        })
        .collect();

    Ok((
        header,
        PatchInfo {
            control_len,
            diff_len,
            dst_len,
            control,
        },
    ))
}

/// Read one 8-byte length field, rejecting negatives.
fn read_len<R: Read>(r: &mut R, what: &str) -> Result<usize, FormatError> {
    let n = offt::read_int64(r).map_err(FormatError::truncated)?;
    usize::try_from(n)
        .map_err(|_| FormatError::InvalidInput(format!("invalid {what} length: {n}")))
}

/// Length-bounded section read. Stops exactly at `len` bytes; a shorter
/// stream is a truncation error. Bounded via `take` so a hostile length
/// field cannot force a huge up-front allocation.
fn read_section<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>, FormatError> {
    let mut buf = Vec::new();
    let n = r.take(len as u64).read_to_end(&mut buf)?;
    if n < len {
        return Err(FormatError::Truncated);
    }
    Ok(buf)
}

fn decompress(provider: Provider, data: &[u8]) -> Result<Vec<u8>, FormatError> {
    provider
        .decompress(data)
        .map_err(|e| FormatError::Decompression(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
