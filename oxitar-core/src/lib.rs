//! # OxiTar Core
//!
//! Core components for the OxiTar archive library.
//!
//! This crate provides the building blocks shared by the codec and the
//! session engine:
//!
//! - [`entry`]: Archive entry metadata
//! - [`traits`]: Byte source/sink capabilities and compression levels
//! - [`error`]: Error types and the error taxonomy
//!
//! ## Architecture
//!
//! OxiTar is designed as a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Session                                             │
//! │     ArchiveSession, append engine, extraction, CLI     │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     tar headers, TarReader/TarWriter, filters          │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Core (this crate)                                   │
//! │     EntryMetadata, ByteSource/ByteSink, errors         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxitar_core::{EntryKind, EntryMetadata};
//!
//! let mut entry = EntryMetadata::file("copy.txt", 0);
//! entry.hardlink_target = Some("orig.txt".to_string());
//! assert_eq!(entry.kind(), EntryKind::Hardlink);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod entry;
pub mod error;
pub mod traits;

// Re-exports for convenience
pub use entry::{EntryKind, EntryMetadata};
pub use error::{ErrorClass, OxiTarError, PathContext, Result};
pub use traits::{ByteSink, ByteSource, CompressionLevel};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::entry::{EntryKind, EntryMetadata};
    pub use crate::error::{ErrorClass, OxiTarError, Result};
    pub use crate::traits::{ByteSink, ByteSource, CompressionLevel};
}
