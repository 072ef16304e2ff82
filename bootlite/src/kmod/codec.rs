//! Module file decompression.
//!
//! Distribution kernels ship modules as `.ko.xz`, `.ko.zst` or `.ko.gz`.
//! The codec is picked from the last extension; anything else is read raw.

use std::fmt;
use std::io::{self, Read};
use std::path::Path;

/// Compression applied to a module file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Raw,
    Xz,
    Zstd,
    Gzip,
}

impl Codec {
    /// Pick the codec from a module file's suffix.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("xz") => Codec::Xz,
            Some("zst") => Codec::Zstd,
            Some("gz") => Codec::Gzip,
            _ => Codec::Raw,
        }
    }

    /// Decode a whole module image held in memory.
    pub fn decode(self, data: Vec<u8>) -> io::Result<Vec<u8>> {
        match self {
            Codec::Raw => Ok(data),
            Codec::Xz => {
                let mut out = Vec::with_capacity(data.len() * 4);
                xz2::read::XzDecoder::new(data.as_slice()).read_to_end(&mut out)?;
                Ok(out)
            }
            Codec::Zstd => zstd::stream::decode_all(data.as_slice()),
            Codec::Gzip => {
                let mut out = Vec::with_capacity(data.len() * 4);
                flate2::read::GzDecoder::new(data.as_slice()).read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Raw => "raw",
            Codec::Xz => "xz",
            Codec::Zstd => "zstd",
            Codec::Gzip => "gzip",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ELF_HEADER: &[u8] = b"\x7fELF\x02\x01\x01module-body";

    #[test]
    fn test_codec_from_suffix() {
        assert_eq!(Codec::from_path(Path::new("loop.ko.xz")), Codec::Xz);
        assert_eq!(Codec::from_path(Path::new("loop.ko.zst")), Codec::Zstd);
        assert_eq!(Codec::from_path(Path::new("loop.ko.gz")), Codec::Gzip);
        assert_eq!(Codec::from_path(Path::new("loop.ko")), Codec::Raw);
        assert_eq!(Codec::from_path(Path::new("loop")), Codec::Raw);
    }

    #[test]
    fn test_decode_xz() {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(ELF_HEADER).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(Codec::Xz.decode(compressed).unwrap(), ELF_HEADER);
    }

    #[test]
    fn test_decode_zstd() {
        let compressed = zstd::stream::encode_all(ELF_HEADER, 3).unwrap();
        assert_eq!(Codec::Zstd.decode(compressed).unwrap(), ELF_HEADER);
    }

    #[test]
    fn test_decode_gzip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(ELF_HEADER).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(Codec::Gzip.decode(compressed).unwrap(), ELF_HEADER);
    }

    #[test]
    fn test_decode_corrupt_xz_fails() {
        let result = Codec::Xz.decode(b"definitely not xz".to_vec());
        assert!(result.is_err());
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(Codec::Raw.decode(ELF_HEADER.to_vec()).unwrap(), ELF_HEADER);
    }
}
