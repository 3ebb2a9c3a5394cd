//! Oxibsdiff: BSDIFF4/BSDF2 binary patch format in Rust.
//!
//! The crate provides:
//! - The patch container codec (`format`): magic negotiation, compressed
//!   sections, control tuples
//! - Pluggable block compression (`compress`): bzip2 and Brotli providers
//! - The diff/patch engines (`engine`): suffix-array bsdiff matching and
//!   bspatch reconstruction
//! - File-oriented helpers (`io`), including safe in-place patching
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use oxibsdiff::{Format, diff, patch};
//!
//! let source = b"hello old world";
//! let target = b"hello new world";
//!
//! let delta = diff(source, target, Format::Legacy).unwrap();
//! let rebuilt = patch(source, &delta, Format::Legacy).unwrap();
//! assert_eq!(rebuilt, target);
//! ```

use std::io::Cursor;

pub mod compress;
pub mod engine;
pub mod format;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use format::{Control, Format, FormatError, Patch, PatchInfo};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for the top-level diff/patch operations.
#[derive(Debug)]
pub enum Error {
    /// Container encoding/decoding failed.
    Format(FormatError),
    /// Patch application failed.
    Apply(engine::ApplyError),
    /// File I/O failed.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(e) => write!(f, "{e}"),
            Self::Apply(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Format(e) => Some(e),
            Self::Apply(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<engine::ApplyError> for Error {
    fn from(e: engine::ApplyError) -> Self {
        Self::Apply(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Byte-level operations
// ---------------------------------------------------------------------------

/// Produce a patch transforming `src` into `dst`, serialized in the given
/// container format.
pub fn diff(src: &[u8], dst: &[u8], format: Format) -> Result<Vec<u8>, Error> {
    let (control, diff_bytes, extra_bytes) = engine::compute_diff(src, dst);
    let mut out = Vec::new();
    format::write_patch(&mut out, dst.len(), &control, &diff_bytes, &extra_bytes, format)?;
    Ok(out)
}

/// Apply a serialized patch to `src`, returning the reconstructed
/// destination.
///
/// There is no validation that `src` matches the buffer the patch was
/// diffed against; the format carries no source checksum. A mismatched
/// source produces wrong output or an [`engine::ApplyError`].
pub fn patch(src: &[u8], patch_bytes: &[u8], format: Format) -> Result<Vec<u8>, Error> {
    let decoded = format::read_patch(&mut Cursor::new(patch_bytes), format)?;
    let dst = engine::apply_patch(
        src,
        decoded.dst_len,
        &decoded.control,
        &decoded.diff,
        &decoded.extra,
    )?;
    Ok(dst)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
