//! Compression auto-detection.
//!
//! Reading sessions sniff the leading magic bytes of the stream; writing
//! sessions opened on a path without an explicit method look at the
//! filename suffix instead.

use oxitar_core::error::{OxiTarError, Result};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Number of leading bytes needed to recognise every supported filter.
pub const MAGIC_LEN: usize = 6;

/// Compression filter applied around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum CompressionMethod {
    /// Plain tar.
    #[default]
    None,
    /// gzip (.tar.gz, .tgz).
    Gzip,
    /// bzip2 (.tar.bz2, .tbz2, .tbz).
    Bzip2,
    /// xz (.tar.xz, .txz).
    Xz,
    /// Zstandard (.tar.zst, .tar.zstd).
    Zstd,
    /// LZ4 frame (.tar.lz4).
    Lz4,
}

/// Suffix table for filename detection. Matched exactly, case-sensitively.
const SUFFIXES: &[(&str, CompressionMethod)] = &[
    (".tar.gz", CompressionMethod::Gzip),
    (".tgz", CompressionMethod::Gzip),
    (".tar.bz2", CompressionMethod::Bzip2),
    (".tbz2", CompressionMethod::Bzip2),
    (".tbz", CompressionMethod::Bzip2),
    (".tar.xz", CompressionMethod::Xz),
    (".txz", CompressionMethod::Xz),
    (".tar.zst", CompressionMethod::Zstd),
    (".tar.zstd", CompressionMethod::Zstd),
    (".tar.lz4", CompressionMethod::Lz4),
];

impl CompressionMethod {
    /// All methods, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Gzip,
        Self::Bzip2,
        Self::Xz,
        Self::Zstd,
        Self::Lz4,
    ];

    /// Detect the method from a filename suffix.
    ///
    /// Anything not in the suffix table (including plain `.tar`) is
    /// [`CompressionMethod::None`].
    pub fn from_suffix(name: &str) -> Self {
        SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, method)| *method)
            .unwrap_or(Self::None)
    }

    /// Detect the method from a path's file name.
    pub fn from_path(path: &Path) -> Self {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(Self::from_suffix)
            .unwrap_or(Self::None)
    }

    /// Detect the method from magic bytes.
    pub fn from_magic(magic: &[u8]) -> Self {
        // GZIP: 0x1F 0x8B
        if magic.starts_with(&[0x1F, 0x8B]) {
            return Self::Gzip;
        }

        // Bzip2: "BZh" followed by the block size digit
        if magic.len() >= 4 && magic.starts_with(b"BZh") && (b'1'..=b'9').contains(&magic[3]) {
            return Self::Bzip2;
        }

        // XZ: 0xFD '7zXZ' 0x00
        if magic.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
            return Self::Xz;
        }

        // Zstandard: 0xFD2FB528 little-endian
        if magic.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            return Self::Zstd;
        }

        // LZ4 frame: 0x184D2204 little-endian
        if magic.starts_with(&[0x04, 0x22, 0x4D, 0x18]) {
            return Self::Lz4;
        }

        Self::None
    }

    /// Detect the method from a reader, returning the bytes consumed.
    pub fn detect<R: Read>(reader: &mut R) -> Result<(Self, Vec<u8>)> {
        let mut magic = vec![0u8; MAGIC_LEN];
        let mut filled = 0;
        while filled < MAGIC_LEN {
            match reader.read(&mut magic[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        magic.truncate(filled);
        Ok((Self::from_magic(&magic), magic))
    }

    /// Lowercase method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
            Self::Lz4 => "lz4",
        }
    }

    /// Get the typical archive file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "tar",
            Self::Gzip => "tar.gz",
            Self::Bzip2 => "tar.bz2",
            Self::Xz => "tar.xz",
            Self::Zstd => "tar.zst",
            Self::Lz4 => "tar.lz4",
        }
    }

    /// Get the MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::None => "application/x-tar",
            Self::Gzip => "application/gzip",
            Self::Bzip2 => "application/x-bzip2",
            Self::Xz => "application/x-xz",
            Self::Zstd => "application/zstd",
            Self::Lz4 => "application/x-lz4",
        }
    }

    /// Whether the method accepts a numeric level.
    pub fn supports_level(&self) -> bool {
        matches!(self, Self::Gzip | Self::Bzip2 | Self::Xz | Self::Zstd)
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionMethod {
    type Err = OxiTarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            "xz" => Ok(Self::Xz),
            "zstd" | "zst" => Ok(Self::Zstd),
            "lz4" => Ok(Self::Lz4),
            _ => Err(OxiTarError::unsupported_method(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_suffix_table() {
        assert_eq!(CompressionMethod::from_suffix("a.tar.gz"), CompressionMethod::Gzip);
        assert_eq!(CompressionMethod::from_suffix("a.tgz"), CompressionMethod::Gzip);
        assert_eq!(CompressionMethod::from_suffix("a.tar.bz2"), CompressionMethod::Bzip2);
        assert_eq!(CompressionMethod::from_suffix("a.tbz2"), CompressionMethod::Bzip2);
        assert_eq!(CompressionMethod::from_suffix("a.tbz"), CompressionMethod::Bzip2);
        assert_eq!(CompressionMethod::from_suffix("a.tar.xz"), CompressionMethod::Xz);
        assert_eq!(CompressionMethod::from_suffix("a.txz"), CompressionMethod::Xz);
        assert_eq!(CompressionMethod::from_suffix("a.tar.zst"), CompressionMethod::Zstd);
        assert_eq!(CompressionMethod::from_suffix("a.tar.zstd"), CompressionMethod::Zstd);
        assert_eq!(CompressionMethod::from_suffix("a.tar.lz4"), CompressionMethod::Lz4);
        assert_eq!(CompressionMethod::from_suffix("a.tar"), CompressionMethod::None);
        assert_eq!(CompressionMethod::from_suffix("a.gz"), CompressionMethod::None);
        assert_eq!(CompressionMethod::from_suffix("a.TAR.GZ"), CompressionMethod::None);
    }

    #[test]
    fn test_from_path() {
        let path = Path::new("/tmp/backup.d/out.txz");
        assert_eq!(CompressionMethod::from_path(path), CompressionMethod::Xz);
        assert_eq!(CompressionMethod::from_path(Path::new("/")), CompressionMethod::None);
    }

    #[test]
    fn test_detect_magic() {
        assert_eq!(CompressionMethod::from_magic(&[0x1F, 0x8B, 0x08]), CompressionMethod::Gzip);
        assert_eq!(CompressionMethod::from_magic(b"BZh91AY"), CompressionMethod::Bzip2);
        assert_eq!(
            CompressionMethod::from_magic(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]),
            CompressionMethod::Xz
        );
        assert_eq!(
            CompressionMethod::from_magic(&[0x28, 0xB5, 0x2F, 0xFD]),
            CompressionMethod::Zstd
        );
        assert_eq!(
            CompressionMethod::from_magic(&[0x04, 0x22, 0x4D, 0x18]),
            CompressionMethod::Lz4
        );
        assert_eq!(CompressionMethod::from_magic(b"hello"), CompressionMethod::None);
        assert_eq!(CompressionMethod::from_magic(&[]), CompressionMethod::None);
    }

    #[test]
    fn test_detect_short_reader() {
        let mut cursor = Cursor::new(vec![0x1F]);
        let (method, consumed) = CompressionMethod::detect(&mut cursor).unwrap();
        assert_eq!(method, CompressionMethod::None);
        assert_eq!(consumed, vec![0x1F]);
    }

    #[test]
    fn test_parse_and_display() {
        for method in CompressionMethod::ALL {
            let parsed: CompressionMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed, method);
        }
        assert_eq!("GZ".parse::<CompressionMethod>().unwrap(), CompressionMethod::Gzip);
        assert!("rar".parse::<CompressionMethod>().is_err());
    }
}
