// Block compression providers for patch sections.
//
// Each of the three container sections (control, diff, extra) is compressed
// independently by one of two interchangeable providers:
//
//   - `Bzip2`  (wire code 1) — the BSDIFF4 codec, level 9 like Python's
//     `bz2.compress` default
//   - `Brotli` (wire code 2) — the BSDF2 codec, default encoder parameters
//     like Python's `brotli.compress`
//
// The Legacy format never records a code (bzip2 is implicit); the Modern
// format records one code per section in header bytes 5..=7. Decoders treat
// code 2 as Brotli and anything else as bzip2, matching bsdiff4.

use std::io::{self, Read, Write};

/// Wire selector code for the bzip2 provider.
pub const CODE_BZIP2: u8 = 1;
/// Wire selector code for the Brotli provider.
pub const CODE_BROTLI: u8 = 2;

/// A block compression provider, selected per patch (and, on decode,
/// per section) by its one-byte wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// bzip2, the implicit codec of the Legacy (BSDIFF4) format.
    Bzip2,
    /// Brotli, the codec the Modern (BSDF2) writer selects.
    Brotli,
}

impl Provider {
    /// The one-byte code recorded in a Modern header for this provider.
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Self::Bzip2 => CODE_BZIP2,
            Self::Brotli => CODE_BROTLI,
        }
    }

    /// Decode-side dispatch: `2` selects Brotli, anything else bzip2.
    #[inline]
    pub fn from_code(code: u8) -> Self {
        if code == CODE_BROTLI {
            Self::Brotli
        } else {
            Self::Bzip2
        }
    }

    /// Compress a section. Round-trips with [`Provider::decompress`] for any
    /// input, including empty.
    pub fn compress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Bzip2 => {
                let mut encoder =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Brotli => {
                let params = brotli::enc::BrotliEncoderParams::default();
                let mut output = Vec::new();
                brotli::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
                Ok(output)
            }
        }
    }

    /// Decompress a section previously produced by [`Provider::compress`].
    /// Malformed input fails with an `InvalidData`-class error.
    pub fn decompress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Bzip2 => {
                let mut decoder = bzip2::read::BzDecoder::new(data);
                let mut output = Vec::new();
                decoder.read_to_end(&mut output)?;
                Ok(output)
            }
            Self::Brotli => {
                let mut output = Vec::new();
                brotli::BrotliDecompress(&mut io::Cursor::new(data), &mut output)?;
                Ok(output)
            }
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bzip2 => write!(f, "bzip2"),
            Self::Brotli => write!(f, "brotli"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDERS: [Provider; 2] = [Provider::Bzip2, Provider::Brotli];

    #[test]
    fn roundtrip_text() {
        let data: Vec<u8> = b"Hello, world! This is test data. "
            .iter()
            .copied()
            .cycle()
            .take(1024)
            .collect();
        for provider in PROVIDERS {
            let compressed = provider.compress(&data).unwrap();
            assert!(compressed.len() < data.len(), "{provider} did not shrink");
            let decompressed = provider.decompress(&compressed).unwrap();
            assert_eq!(decompressed, data, "{provider} roundtrip");
        }
    }

    #[test]
    fn roundtrip_empty() {
        for provider in PROVIDERS {
            let compressed = provider.compress(b"").unwrap();
            let decompressed = provider.decompress(&compressed).unwrap();
            assert!(decompressed.is_empty(), "{provider} empty roundtrip");
        }
    }

    #[test]
    fn roundtrip_incompressible() {
        let data: Vec<u8> = (0u16..4096).map(|i| (i.wrapping_mul(251) >> 3) as u8).collect();
        for provider in PROVIDERS {
            let compressed = provider.compress(&data).unwrap();
            assert_eq!(provider.decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn truncated_input_rejected() {
        let data = vec![0x5Au8; 4096];
        for provider in PROVIDERS {
            let compressed = provider.compress(&data).unwrap();
            let truncated = &compressed[..compressed.len() / 2];
            assert!(provider.decompress(truncated).is_err(), "{provider}");
        }
    }

    #[test]
    fn bzip2_rejects_bad_magic() {
        // bzip2 streams start with "BZh"; anything else is malformed.
        assert!(Provider::Bzip2.decompress(b"not a bzip2 stream").is_err());
    }

    #[test]
    fn code_dispatch() {
        assert_eq!(Provider::Bzip2.code(), CODE_BZIP2);
        assert_eq!(Provider::Brotli.code(), CODE_BROTLI);
        assert_eq!(Provider::from_code(2), Provider::Brotli);
        // Anything that is not 2 means bzip2, matching bsdiff4's reader.
        for code in [0u8, 1, 3, 0x7F, 0xFF] {
            assert_eq!(Provider::from_code(code), Provider::Bzip2);
        }
    }
}
