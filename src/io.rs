// File-level patch operations.
//
// Thin wrappers over the byte-level `diff`/`patch`: whole files are read
// into memory, transformed, and written back out. The one non-trivial path
// is in-place patching, which mutates its target with no rollback:
//
//   1. read the entire target into memory
//   2. decode the patch and fully materialize the reconstruction
//   3. only then seek to the start, write, and truncate
//
// The reconstruction must complete before the first destructive write; the
// patch engine reads the original source bytes throughout. A failure after
// step 3 begins leaves the file in an undefined state — callers needing
// atomicity must write to a temporary file and rename, which these helpers
// do not do.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::format::Format;
use crate::{Error, diff, patch};

/// Diff the files at `src_path` and `dst_path`, writing the patch to
/// `patch_path`.
pub fn file_diff(
    src_path: &Path,
    dst_path: &Path,
    patch_path: &Path,
    format: Format,
) -> Result<(), Error> {
    let src = std::fs::read(src_path)?;
    let dst = std::fs::read(dst_path)?;
    let delta = diff(&src, &dst, format)?;
    debug!(
        "file_diff: {} ({} bytes) -> {} ({} bytes): patch {} bytes",
        src_path.display(),
        src.len(),
        dst_path.display(),
        dst.len(),
        delta.len(),
    );
    std::fs::write(patch_path, delta)?;
    Ok(())
}

/// Apply the patch at `patch_path` to `src_path`, writing the result to
/// `dst_path`.
///
/// When source and destination resolve to the same absolute path, this
/// routes through [`file_patch_inplace`] instead of truncating the source
/// it is about to read.
pub fn file_patch(
    src_path: &Path,
    dst_path: &Path,
    patch_path: &Path,
    format: Format,
) -> Result<(), Error> {
    if std::path::absolute(src_path)? == std::path::absolute(dst_path)? {
        return file_patch_inplace(src_path, patch_path, format);
    }

    let src = std::fs::read(src_path)?;
    let patch_bytes = std::fs::read(patch_path)?;
    let dst = patch(&src, &patch_bytes, format)?;
    let mut out = File::create(dst_path)?;
    out.write_all(&dst)?;
    Ok(())
}

/// Apply the patch at `patch_path` to the file at `path`, in place.
pub fn file_patch_inplace(path: &Path, patch_path: &Path, format: Format) -> Result<(), Error> {
    let patch_bytes = std::fs::read(patch_path)?;

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut src = Vec::new();
    file.read_to_end(&mut src)?;

    // Compute-then-commit: the full destination exists in memory before the
    // first byte of the target is overwritten.
    let dst = patch(&src, &patch_bytes, format)?;

    debug!(
        "file_patch_inplace: {} {} -> {} bytes",
        path.display(),
        src.len(),
        dst.len(),
    );

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&dst)?;
    file.set_len(dst.len() as u64)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
