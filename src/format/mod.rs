// BSDIFF4/BSDF2 container format.
//
// This module owns the on-disk patch representation:
//
// - `offt`      — sign-and-magnitude 8-byte integer fields
// - `header`    — magic negotiation and per-section provider selectors
// - `container` — section layout, control tuples, encode/decode

pub mod container;
pub mod header;
pub mod offt;

// Re-export key types for convenience.
pub use container::{Control, FormatError, Patch, PatchInfo, read_info, read_patch, write_patch};
pub use header::{Format, MAGIC_BSDF2, MAGIC_BSDIFF4, PatchHeader};
