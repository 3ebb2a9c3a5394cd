// Patch container magic and header negotiation.
//
// Two container variants share one layout and differ only in the leading
// 8-byte magic block:
//
//   Legacy  "BSDIFF40"            — all sections implicitly bzip2
//   Modern  "BSDF2" + 3 selectors — one provider code per section
//                                   (control, diff, extra) at bytes 5..=7
//
// Validation mirrors bsdiff4: Legacy checks the first 7 magic bytes, Modern
// the first 4. Byte 4 of the Modern magic (the ASCII '2') is written but
// never checked on read.

use std::io::{self, Read, Write};

use crate::compress::Provider;

use super::container::FormatError;

/// Legacy magic marker.
pub const MAGIC_BSDIFF4: &[u8; 8] = b"BSDIFF40";
/// Modern magic marker (followed on the wire by 3 provider-selector bytes).
pub const MAGIC_BSDF2: &[u8; 5] = b"BSDF2";

/// Total size of the magic block in either variant.
pub const MAGIC_SIZE: usize = 8;

/// The container format variant a patch is written in (and a reader
/// expects). Negotiation is explicit: a reader expecting one variant fails
/// on the other's magic rather than sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// BSDIFF4: bzip2-only, no provider selectors.
    #[default]
    Legacy,
    /// BSDF2: per-section provider selectors in the header.
    Modern,
}

impl Format {
    /// The provider this writer uses for all three sections.
    ///
    /// The format supports per-section independence on read, but the writer
    /// always picks a single provider, exactly as bsdiff4 does.
    #[inline]
    pub fn write_provider(self) -> Provider {
        match self {
            Self::Legacy => Provider::Bzip2,
            Self::Modern => Provider::Brotli,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "BSDIFF4"),
            Self::Modern => write!(f, "BSDF2"),
        }
    }
}

/// Parsed magic block: the variant plus the provider decoding each section,
/// in container order (control, diff, extra).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    pub format: Format,
    pub providers: [Provider; 3],
}

impl PatchHeader {
    /// Header a writer emits for `format` with its single write-side
    /// provider in every section slot.
    pub fn for_writing(format: Format) -> Self {
        Self {
            format,
            providers: [format.write_provider(); 3],
        }
    }

    /// Emit the 8-byte magic block.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self.format {
            Format::Legacy => w.write_all(MAGIC_BSDIFF4),
            Format::Modern => {
                w.write_all(MAGIC_BSDF2)?;
                let codes = self.providers.map(Provider::code);
                w.write_all(&codes)
            }
        }
    }

    /// Read and validate the 8-byte magic block against the expected
    /// variant. The wrong variant's magic is a [`FormatError::MagicMismatch`].
    pub fn decode<R: Read>(r: &mut R, expected: Format) -> Result<Self, FormatError> {
        let mut magic = [0u8; MAGIC_SIZE];
        r.read_exact(&mut magic).map_err(FormatError::truncated)?;

        match expected {
            Format::Legacy => {
                if magic[..7] != MAGIC_BSDIFF4[..7] {
                    return Err(FormatError::MagicMismatch {
                        expected,
                        found: magic,
                    });
                }
                Ok(Self {
                    format: Format::Legacy,
                    providers: [Provider::Bzip2; 3],
                })
            }
            Format::Modern => {
                if magic[..4] != MAGIC_BSDF2[..4] {
                    return Err(FormatError::MagicMismatch {
                        expected,
                        found: magic,
                    });
                }
                Ok(Self {
                    format: Format::Modern,
                    providers: [
                        Provider::from_code(magic[5]),
                        Provider::from_code(magic[6]),
                        Provider::from_code(magic[7]),
                    ],
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn legacy_magic_bytes() {
        let mut buf = Vec::new();
        PatchHeader::for_writing(Format::Legacy).encode(&mut buf).unwrap();
        assert_eq!(buf, b"BSDIFF40");
    }

    #[test]
    fn modern_magic_bytes() {
        let mut buf = Vec::new();
        PatchHeader::for_writing(Format::Modern).encode(&mut buf).unwrap();
        assert_eq!(buf, b"BSDF2\x02\x02\x02");
    }

    #[test]
    fn roundtrip_both_variants() {
        for format in [Format::Legacy, Format::Modern] {
            let header = PatchHeader::for_writing(format);
            let mut buf = Vec::new();
            header.encode(&mut buf).unwrap();
            let decoded = PatchHeader::decode(&mut Cursor::new(&buf), format).unwrap();
            assert_eq!(decoded, header);
        }
    }

    #[test]
    fn cross_variant_rejected() {
        let mut legacy = Vec::new();
        PatchHeader::for_writing(Format::Legacy).encode(&mut legacy).unwrap();
        let mut modern = Vec::new();
        PatchHeader::for_writing(Format::Modern).encode(&mut modern).unwrap();

        let err = PatchHeader::decode(&mut Cursor::new(&legacy), Format::Modern).unwrap_err();
        assert!(matches!(err, FormatError::MagicMismatch { .. }));
        let err = PatchHeader::decode(&mut Cursor::new(&modern), Format::Legacy).unwrap_err();
        assert!(matches!(err, FormatError::MagicMismatch { .. }));
    }

    #[test]
    fn modern_selectors_parsed_per_section() {
        let raw = b"BSDF2\x02\x01\x02";
        let decoded = PatchHeader::decode(&mut Cursor::new(raw), Format::Modern).unwrap();
        assert_eq!(
            decoded.providers,
            [Provider::Brotli, Provider::Bzip2, Provider::Brotli]
        );
    }

    #[test]
    fn unknown_selector_means_bzip2() {
        let raw = b"BSDF2\x09\x00\xFF";
        let decoded = PatchHeader::decode(&mut Cursor::new(raw), Format::Modern).unwrap();
        assert_eq!(decoded.providers, [Provider::Bzip2; 3]);
    }

    #[test]
    fn modern_version_byte_not_checked() {
        // Only "BSDF" is validated; byte 4 may differ, as in bsdiff4.
        let raw = b"BSDF9\x02\x02\x02";
        assert!(PatchHeader::decode(&mut Cursor::new(raw), Format::Modern).is_ok());
    }

    #[test]
    fn legacy_version_byte_not_checked() {
        // "BSDIFF4" is validated; the trailing '0' may differ.
        let raw = b"BSDIFF4X";
        assert!(PatchHeader::decode(&mut Cursor::new(raw), Format::Legacy).is_ok());
    }

    #[test]
    fn short_magic_is_truncation() {
        let err = PatchHeader::decode(&mut Cursor::new(b"BSD"), Format::Legacy).unwrap_err();
        assert!(matches!(err, FormatError::Truncated));
    }
}
