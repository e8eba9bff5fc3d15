//! Streaming compression filters.
//!
//! [`FilterWriter`] wraps the write side of a tar stream in the selected
//! compressor; [`FilterReader`] sniffs the read side and installs the
//! matching decompressor, so every supported filter is readable without
//! the caller naming it.

use crate::detect::CompressionMethod;
use oxitar_core::error::Result;
use oxitar_core::CompressionLevel;
use std::io::{self, Chain, Cursor, Read, Write};

/// A reader with already-sniffed bytes pushed back in front.
pub type Prefixed<R> = Chain<Cursor<Vec<u8>>, R>;

/// Compressing writer for one of the supported filters.
pub enum FilterWriter<W: Write> {
    /// No compression.
    None(W),
    /// gzip.
    Gzip(flate2::write::GzEncoder<W>),
    /// bzip2.
    Bzip2(bzip2::write::BzEncoder<W>),
    /// xz.
    Xz(xz2::write::XzEncoder<W>),
    /// Zstandard.
    Zstd(zstd::stream::write::Encoder<'static, W>),
    /// LZ4 frame.
    Lz4(lz4_flex::frame::FrameEncoder<W>),
}

impl<W: Write> FilterWriter<W> {
    /// Wrap `inner` in the compressor for `method`.
    ///
    /// A level in 1-9 is applied when the method supports one. Any other
    /// level is reported with a warning and the filter's default is used.
    pub fn new(inner: W, method: CompressionMethod, level: Option<u32>) -> Result<Self> {
        let level = effective_level(method, level);
        let writer = match method {
            CompressionMethod::None => Self::None(inner),
            CompressionMethod::Gzip => {
                let compression = level
                    .map(|l| flate2::Compression::new(u32::from(l.level())))
                    .unwrap_or_default();
                Self::Gzip(flate2::write::GzEncoder::new(inner, compression))
            }
            CompressionMethod::Bzip2 => {
                let compression = level
                    .map(|l| bzip2::Compression::new(u32::from(l.level())))
                    .unwrap_or_default();
                Self::Bzip2(bzip2::write::BzEncoder::new(inner, compression))
            }
            CompressionMethod::Xz => {
                let preset = level.map(|l| u32::from(l.level())).unwrap_or(6);
                Self::Xz(xz2::write::XzEncoder::new(inner, preset))
            }
            CompressionMethod::Zstd => {
                // 0 selects the library default.
                let zlevel = level.map(|l| i32::from(l.level())).unwrap_or(0);
                Self::Zstd(zstd::stream::write::Encoder::new(inner, zlevel)?)
            }
            CompressionMethod::Lz4 => Self::Lz4(lz4_flex::frame::FrameEncoder::new(inner)),
        };
        Ok(writer)
    }

    /// The method this writer compresses with.
    pub fn method(&self) -> CompressionMethod {
        match self {
            Self::None(_) => CompressionMethod::None,
            Self::Gzip(_) => CompressionMethod::Gzip,
            Self::Bzip2(_) => CompressionMethod::Bzip2,
            Self::Xz(_) => CompressionMethod::Xz,
            Self::Zstd(_) => CompressionMethod::Zstd,
            Self::Lz4(_) => CompressionMethod::Lz4,
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        match self {
            Self::None(w) => w,
            Self::Gzip(e) => e.get_ref(),
            Self::Bzip2(e) => e.get_ref(),
            Self::Xz(e) => e.get_ref(),
            Self::Zstd(e) => e.get_ref(),
            Self::Lz4(e) => e.get_ref(),
        }
    }

    /// Write the compressor trailer and return the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        let mut inner = match self {
            Self::None(w) => w,
            Self::Gzip(e) => e.finish()?,
            Self::Bzip2(e) => e.finish()?,
            Self::Xz(e) => e.finish()?,
            Self::Zstd(e) => e.finish()?,
            Self::Lz4(e) => e.finish().map_err(io::Error::other)?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for FilterWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::None(w) => w.write(buf),
            Self::Gzip(e) => e.write(buf),
            Self::Bzip2(e) => e.write(buf),
            Self::Xz(e) => e.write(buf),
            Self::Zstd(e) => e.write(buf),
            Self::Lz4(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::None(w) => w.flush(),
            Self::Gzip(e) => e.flush(),
            Self::Bzip2(e) => e.flush(),
            Self::Xz(e) => e.flush(),
            Self::Zstd(e) => e.flush(),
            Self::Lz4(e) => e.flush(),
        }
    }
}

/// Resolve the requested level, warning about levels that cannot apply.
fn effective_level(method: CompressionMethod, level: Option<u32>) -> Option<CompressionLevel> {
    let raw = level?;
    if method == CompressionMethod::None {
        return None;
    }
    let Some(checked) = CompressionLevel::checked(raw) else {
        log::warn!("compression level {raw} is outside 1-9; using the {method} default");
        return None;
    };
    if !method.supports_level() {
        log::warn!("{method} does not accept a compression level; ignoring level {raw}");
        return None;
    }
    Some(checked)
}

/// Decompressing reader, selected by sniffing the stream's magic bytes.
pub enum FilterReader<R: Read> {
    /// Plain tar.
    None(Prefixed<R>),
    /// gzip, including concatenated members.
    Gzip(flate2::read::MultiGzDecoder<Prefixed<R>>),
    /// bzip2, including concatenated streams.
    Bzip2(bzip2::read::MultiBzDecoder<Prefixed<R>>),
    /// xz, including concatenated streams.
    Xz(xz2::read::XzDecoder<Prefixed<R>>),
    /// Zstandard.
    Zstd(zstd::stream::read::Decoder<'static, io::BufReader<Prefixed<R>>>),
    /// LZ4 frame.
    Lz4(lz4_flex::frame::FrameDecoder<Prefixed<R>>),
}

impl<R: Read> FilterReader<R> {
    /// Sniff `inner` and wrap it in the matching decompressor.
    pub fn new(mut inner: R) -> Result<Self> {
        let (method, magic) = CompressionMethod::detect(&mut inner)?;
        log::debug!("detected {method} input");
        Self::with_prefix(Cursor::new(magic).chain(inner), method)
    }

    fn with_prefix(input: Prefixed<R>, method: CompressionMethod) -> Result<Self> {
        let reader = match method {
            CompressionMethod::None => Self::None(input),
            CompressionMethod::Gzip => Self::Gzip(flate2::read::MultiGzDecoder::new(input)),
            CompressionMethod::Bzip2 => Self::Bzip2(bzip2::read::MultiBzDecoder::new(input)),
            CompressionMethod::Xz => Self::Xz(xz2::read::XzDecoder::new_multi_decoder(input)),
            CompressionMethod::Zstd => Self::Zstd(zstd::stream::read::Decoder::new(input)?),
            CompressionMethod::Lz4 => Self::Lz4(lz4_flex::frame::FrameDecoder::new(input)),
        };
        Ok(reader)
    }

    /// The detected method.
    pub fn method(&self) -> CompressionMethod {
        match self {
            Self::None(_) => CompressionMethod::None,
            Self::Gzip(_) => CompressionMethod::Gzip,
            Self::Bzip2(_) => CompressionMethod::Bzip2,
            Self::Xz(_) => CompressionMethod::Xz,
            Self::Zstd(_) => CompressionMethod::Zstd,
            Self::Lz4(_) => CompressionMethod::Lz4,
        }
    }
}

impl<R: Read> Read for FilterReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::None(r) => r.read(buf),
            Self::Gzip(d) => d.read(buf),
            Self::Bzip2(d) => d.read(buf),
            Self::Xz(d) => d.read(buf),
            Self::Zstd(d) => d.read(buf),
            Self::Lz4(d) => d.read(buf),
        }
    }
}
