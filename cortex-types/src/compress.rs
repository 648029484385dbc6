//! Gzip helpers used by the document cache and bounded string manager.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compress bytes with gzip at the default level.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress gzip bytes.
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Whether the bytes start with the gzip magic header.
#[must_use]
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_bytes() {
        let input = b"hello hello hello".to_vec();
        let packed = gzip(&input).unwrap();
        assert!(is_gzip(&packed));
        assert_eq!(gunzip(&packed).unwrap(), input);
    }

    #[test]
    fn compressible_input_shrinks() {
        let input = "line of repeated text\n".repeat(500);
        let packed = gzip(input.as_bytes()).unwrap();
        // Real compression, not an identity pass.
        assert!(packed.len() < input.len() / 4);
    }

    #[test]
    fn empty_input_roundtrips() {
        let packed = gzip(b"").unwrap();
        assert_eq!(gunzip(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn is_gzip_rejects_plain_text() {
        assert!(!is_gzip(b"plain text"));
        assert!(!is_gzip(b""));
    }
}
