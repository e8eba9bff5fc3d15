//! # OxiTar Archive
//!
//! The tar codec used by OxiTar sessions.
//!
//! This crate provides:
//!
//! - **TAR**: forward-only [`TarReader`] and streaming [`TarWriter`] for the
//!   ustar, pax, gnu and v7 sub-formats
//! - **Filters**: [`FilterReader`] / [`FilterWriter`] wrapping the tar stream
//!   in gzip, bzip2, xz, zstd or lz4
//! - **Detection**: [`CompressionMethod`] from magic bytes or a filename suffix
//!
//! ## Example
//!
//! ```rust
//! use oxitar_archive::{CompressionMethod, FilterReader, FilterWriter, TarFormat, TarReader, TarWriter};
//! use oxitar_core::EntryMetadata;
//! use std::io::Cursor;
//!
//! let sink = FilterWriter::new(Vec::new(), CompressionMethod::Gzip, Some(9)).unwrap();
//! let mut writer = TarWriter::new(sink, TarFormat::Pax);
//! writer.add_entry(&EntryMetadata::file("hello.txt", 0), b"Hello, World!").unwrap();
//! let packed = writer.finish().unwrap().finish().unwrap();
//!
//! let mut reader = TarReader::new(FilterReader::new(Cursor::new(packed)).unwrap());
//! let entry = reader.next_header().unwrap().unwrap();
//! assert_eq!(entry.name, "hello.txt");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod detect;
pub mod filter;
pub mod tar;

// Re-exports
pub use detect::CompressionMethod;
pub use filter::{FilterReader, FilterWriter};
pub use tar::{BLOCK_SIZE, TarFormat, TarHeader, TarReader, TarWriter};
