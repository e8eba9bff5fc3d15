//! Byte stream capabilities and compression levels.
//!
//! [`ByteSource`] and [`ByteSink`] are the two capabilities a caller-provided
//! stream must offer to back an archive session. Both are implemented for
//! every `std::io::Read` / `std::io::Write`, so files, sockets, pipes and
//! in-memory cursors plug in directly.

use crate::error::Result;
use std::io::{Read, Write};

/// A pull-based byte source.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. Returns 0 at end of stream.
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// A push-based byte sink.
pub trait ByteSink {
    /// Write all of `buf`.
    fn push(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<()>;
}

impl<R: Read + ?Sized> ByteSource for R {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<W: Write + ?Sized> ByteSink for W {
    fn push(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Write::flush(self)?;
        Ok(())
    }
}

/// Compression level (1-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Fastest compression.
    pub const FAST: Self = Self(1);
    /// Default compression (balanced).
    pub const DEFAULT: Self = Self(6);
    /// Best compression (slowest).
    pub const BEST: Self = Self(9);

    /// Create a level, clamping into 1-9.
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 9))
    }

    /// Create a level only if it lies within 1-9.
    pub fn checked(level: u32) -> Option<Self> {
        match level {
            1..=9 => Some(Self(level as u8)),
            _ => None,
        }
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for CompressionLevel {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_compression_level() {
        assert_eq!(CompressionLevel::FAST.level(), 1);
        assert_eq!(CompressionLevel::DEFAULT.level(), 6);
        assert_eq!(CompressionLevel::BEST.level(), 9);

        // Test clamping
        assert_eq!(CompressionLevel::new(100).level(), 9);
        assert_eq!(CompressionLevel::new(0).level(), 1);

        assert_eq!(CompressionLevel::checked(5), Some(CompressionLevel(5)));
        assert_eq!(CompressionLevel::checked(0), None);
        assert_eq!(CompressionLevel::checked(10), None);
    }

    #[test]
    fn test_blanket_source_and_sink() {
        let mut source = Cursor::new(b"abc".to_vec());
        let mut buf = [0u8; 8];
        assert_eq!(source.pull(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(source.pull(&mut buf).unwrap(), 0);

        let mut sink: Vec<u8> = Vec::new();
        ByteSink::push(&mut sink, b"xy").unwrap();
        ByteSink::flush(&mut sink).unwrap();
        assert_eq!(sink, b"xy");
    }
}
