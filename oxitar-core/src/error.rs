//! Error types for OxiTar operations.
//!
//! Every public operation in the workspace either completes or reports
//! exactly one [`OxiTarError`]. The variants group into a small set of
//! [`ErrorClass`]es so callers can react to a failure category without
//! matching every variant.

use std::io;
use thiserror::Error;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// An archive handle could not be created or opened.
    OpenFailure,
    /// Unsupported or invalid format, filter, or encoding.
    FormatFailure,
    /// Read, write, or copy failure against a backing store.
    IoFailure,
    /// A named entry is absent.
    NotFound,
    /// An unsafe entry or link path was refused during extraction.
    SecurityPathTraversal,
    /// The session or stream adapter is already closed.
    ClosedStream,
    /// The operation requires a mode or state the session is not in.
    InvalidState,
}

/// Which part of an entry carried an unsafe path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathContext {
    /// The entry's own pathname.
    Entry,
    /// The target of a hardlink entry.
    HardlinkTarget,
    /// The target of a symlink entry.
    SymlinkTarget,
}

impl std::fmt::Display for PathContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::HardlinkTarget => write!(f, "hardlink target"),
            Self::SymlinkTarget => write!(f, "symlink target"),
        }
    }
}

/// The main error type for OxiTar operations.
#[derive(Debug, Error)]
pub enum OxiTarError {
    /// I/O error from an underlying reader, writer, or stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive could not be opened.
    #[error("failed to open archive '{target}': {source}")]
    Open {
        /// Path or store description.
        target: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Invalid or unsupported archive content or configuration.
    #[error("format error: {message}")]
    Format {
        /// Description of the problem.
        message: String,
    },

    /// Unsupported compression method or tar format name.
    #[error("unsupported compression method or format: {method}")]
    UnsupportedMethod {
        /// The rejected name.
        method: String,
    },

    /// Entry not found in archive.
    #[error("entry '{name}' not found")]
    EntryNotFound {
        /// Name of the missing entry.
        name: String,
    },

    /// Path traversal attack detected during extraction.
    #[error("refusing to extract {context} with unsafe path: '{path}' (potential path traversal attack)")]
    PathTraversal {
        /// The suspicious path.
        path: String,
        /// Where the path came from.
        context: PathContext,
    },

    /// Operation on a closed session or stream adapter.
    #[error("{what} is closed")]
    Closed {
        /// "archive" or "stream".
        what: &'static str,
    },

    /// Operation not valid in the current mode.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the mismatch.
        message: String,
    },

    /// An option value had the wrong type or range.
    #[error("invalid option '{key}': {message}")]
    InvalidOption {
        /// Option key.
        key: String,
        /// Description of the problem.
        message: String,
    },

    /// Unknown text encoding label.
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },
}

/// Result type alias for OxiTar operations.
pub type Result<T> = std::result::Result<T, OxiTarError>;

impl OxiTarError {
    /// Create an open failure.
    pub fn open(target: impl Into<String>, source: io::Error) -> Self {
        Self::Open {
            target: target.into(),
            source,
        }
    }

    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create an unsupported method error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// Create an entry not found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create a path traversal error.
    pub fn path_traversal(path: impl Into<String>, context: PathContext) -> Self {
        Self::PathTraversal {
            path: path.into(),
            context,
        }
    }

    /// Error for a closed session.
    pub fn archive_closed() -> Self {
        Self::Closed { what: "archive" }
    }

    /// Error for a closed stream adapter.
    pub fn stream_closed() -> Self {
        Self::Closed { what: "stream" }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an invalid option error.
    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// The taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Io(_) => ErrorClass::IoFailure,
            Self::Open { .. } => ErrorClass::OpenFailure,
            Self::Format { .. } | Self::UnsupportedMethod { .. } | Self::Encoding { .. } => {
                ErrorClass::FormatFailure
            }
            Self::EntryNotFound { .. } => ErrorClass::NotFound,
            Self::PathTraversal { .. } => ErrorClass::SecurityPathTraversal,
            Self::Closed { .. } => ErrorClass::ClosedStream,
            Self::InvalidState { .. } | Self::InvalidOption { .. } => ErrorClass::InvalidState,
        }
    }

    /// Check whether this is a security refusal.
    pub fn is_security(&self) -> bool {
        self.class() == ErrorClass::SecurityPathTraversal
    }
}

impl From<OxiTarError> for io::Error {
    fn from(err: OxiTarError) -> Self {
        match err {
            OxiTarError::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}
