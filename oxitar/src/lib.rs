//! # OxiTar
//!
//! Archive sessions over tar files, memory buffers and caller streams.
//!
//! An [`ArchiveSession`] opens one archive in one [`SessionMode`]:
//!
//! - **Read**: catalog entries, read payloads, stream them through an
//!   [`EntryReader`], or extract everything with path traversal checks
//! - **Write**: add files, text, directories and links, or stream a payload
//!   through an [`EntryWriter`]
//! - **Append**: keep the entries of an existing file and add more
//!
//! Compression (gzip, bzip2, xz, zstd, lz4) is detected from magic bytes when
//! reading and from the file suffix when writing, unless
//! [`SessionOptions`] says otherwise.
//!
//! ## Example
//!
//! ```rust
//! use oxitar::{AddOptions, ArchiveSession, CompressionMethod, SessionOptions};
//!
//! let options = SessionOptions::new().with_compression(CompressionMethod::Gzip);
//! let mut session = ArchiveSession::new_in_memory(options).unwrap();
//! session.add_directory("docs", &AddOptions::default()).unwrap();
//! session.add_text("docs/readme.txt", "Read me", None, &AddOptions::default()).unwrap();
//! let packed = session.to_data().unwrap();
//!
//! let mut session = ArchiveSession::from_bytes(packed).unwrap();
//! assert_eq!(session.compression(), CompressionMethod::Gzip);
//! assert_eq!(session.count().unwrap(), 2);
//! assert_eq!(session.read_text("docs/readme.txt", None).unwrap(), "Read me");
//! ```
//!
//! ## Streams
//!
//! Any `Read` or `Write` value can back a session once wrapped with
//! [`shared_source`] or [`shared_sink`]. The session keeps a clone of the
//! shared handle until it is closed.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod append;
pub mod catalog;
pub mod extract;
pub mod options;
pub mod safe_path;
pub mod session;
pub mod store;
pub mod stream;
mod text;
mod write;

pub use catalog::names_equal;
pub use options::{AddOptions, ExtractOptions, OptionValue, SessionOptions};
pub use safe_path::is_safe_path;
pub use session::{ArchiveSession, SessionMode, TAR_BUFFER_SIZE};
pub use store::{BackingStore, MemoryBuffer, SharedSink, SharedSource, shared_sink, shared_source};
pub use stream::{EntryReader, EntryWriter};

pub use oxitar_archive::{CompressionMethod, TarFormat};
pub use oxitar_core::{
    ByteSink, ByteSource, EntryKind, EntryMetadata, ErrorClass, OxiTarError, PathContext, Result,
};
