//! The archive session: one open archive over one backing store.

use crate::options::SessionOptions;
use crate::store::{
    BackingStore, FaultSlot, MemoryBuffer, PullBridge, PullSource, PushBridge, PushTarget,
    SharedSink, SharedSource,
};
use oxitar_archive::{CompressionMethod, FilterReader, FilterWriter, TarFormat, TarReader, TarWriter};
use oxitar_core::{EntryMetadata, OxiTarError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Buffer size for file handles and payload copies.
pub const TAR_BUFFER_SIZE: usize = 64 * 1024;

pub(crate) type ArchiveReader = TarReader<FilterReader<PullSource>>;
pub(crate) type ArchiveWriter = TarWriter<FilterWriter<PushTarget>>;

/// How a session uses its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Catalog and extract entries.
    Read,
    /// Create a new archive, replacing any existing content.
    Write,
    /// Keep the existing entries of a file and add more after them.
    Append,
}

impl SessionMode {
    /// Lowercase mode name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Append => "append",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SessionMode {
    type Err = OxiTarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "r" | "read" => Ok(Self::Read),
            "w" | "write" => Ok(Self::Write),
            "a" | "append" => Ok(Self::Append),
            _ => Err(OxiTarError::invalid_option("mode", format!("unknown session mode '{s}'"))),
        }
    }
}

/// An open tar archive.
///
/// A session owns at most one codec handle at a time: a reader in
/// [`SessionMode::Read`], a writer in the other modes. Lookups restart the
/// reader from the beginning of the store, so every catalog operation costs
/// a scan up to the matching entry.
///
/// ```rust
/// use oxitar::{AddOptions, ArchiveSession, SessionOptions};
///
/// let mut session = ArchiveSession::new_in_memory(SessionOptions::default()).unwrap();
/// session.add("hello.txt", b"Hello!", &AddOptions::default()).unwrap();
/// let bytes = session.to_data().unwrap();
///
/// let mut session = ArchiveSession::from_bytes(bytes).unwrap();
/// assert_eq!(session.read("hello.txt").unwrap(), b"Hello!");
/// ```
pub struct ArchiveSession {
    pub(crate) mode: SessionMode,
    method: CompressionMethod,
    level: Option<u32>,
    format: TarFormat,
    store: Option<BackingStore>,
    spool: Arc<Mutex<Vec<u8>>>,
    pub(crate) reader: Option<ArchiveReader>,
    pub(crate) writer: Option<ArchiveWriter>,
    pub(crate) fault: FaultSlot,
    closed: bool,
}

impl ArchiveSession {
    /// Open a session over any backing store.
    pub fn open(store: BackingStore, mode: SessionMode, options: SessionOptions) -> Result<Self> {
        let method = match (&options.compression, &store) {
            (Some(method), _) => *method,
            (None, BackingStore::Path(path)) => CompressionMethod::from_path(path),
            (None, _) => CompressionMethod::None,
        };

        let mut session = Self {
            mode,
            method,
            level: options.level,
            format: options.format,
            store: Some(store),
            spool: Arc::new(Mutex::new(Vec::new())),
            reader: None,
            writer: None,
            fault: FaultSlot::default(),
            closed: false,
        };

        let opened = match mode {
            SessionMode::Read => session.open_reader(),
            SessionMode::Write => session.open_writer(),
            SessionMode::Append => session.open_append(),
        };
        if let Err(err) = opened {
            // Nothing was written; release handles without finishing.
            session.closed = true;
            return Err(err);
        }

        log::debug!(
            "opened {} session on {} ({}, {})",
            session.mode,
            session.describe_store(),
            session.method,
            session.format
        );
        Ok(session)
    }

    /// Open an archive file.
    pub fn open_path(
        path: impl AsRef<Path>,
        mode: SessionMode,
        options: SessionOptions,
    ) -> Result<Self> {
        Self::open(BackingStore::Path(path.as_ref().to_path_buf()), mode, options)
    }

    /// Read an archive held in memory.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::open(
            BackingStore::Memory(MemoryBuffer::from(data.into())),
            SessionMode::Read,
            SessionOptions::default(),
        )
    }

    /// Build a new archive in memory; collect it with [`to_data`](Self::to_data).
    pub fn new_in_memory(options: SessionOptions) -> Result<Self> {
        Self::open(BackingStore::Memory(MemoryBuffer::new()), SessionMode::Write, options)
    }

    /// Read an archive from a caller stream.
    pub fn from_source(source: SharedSource) -> Result<Self> {
        Self::open(BackingStore::Input(source), SessionMode::Read, SessionOptions::default())
    }

    /// Write an archive into a caller stream.
    pub fn to_sink(sink: SharedSink, options: SessionOptions) -> Result<Self> {
        Self::open(BackingStore::Output(sink), SessionMode::Write, options)
    }

    /// Path of a file-backed session.
    pub fn path(&self) -> Option<&Path> {
        match &self.store {
            Some(BackingStore::Path(path)) => Some(path),
            _ => None,
        }
    }

    /// Current mode. An append to a missing file reports [`SessionMode::Write`].
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Compression in use. For read sessions this is the detected method.
    pub fn compression(&self) -> CompressionMethod {
        self.method
    }

    /// Requested compression level, if any.
    pub fn compression_level(&self) -> Option<u32> {
        self.level
    }

    /// Tar sub-format used for new headers.
    pub fn format(&self) -> TarFormat {
        self.format
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Restart the reader at the beginning of the store.
    pub fn rescan(&mut self) -> Result<()> {
        self.ensure_mode(SessionMode::Read)?;
        self.reader = None;
        self.open_reader()
    }

    /// Finish the archive and release the store.
    ///
    /// Writes the end-of-archive marker and compressor trailer for write
    /// sessions. Stream stores drop their shared handle. Calling `close` again
    /// does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.reader = None;

        let finished = self.finish_writer();

        if matches!(
            self.store,
            Some(BackingStore::Input(_) | BackingStore::Output(_))
        ) {
            self.store = None;
        }
        if let Ok(mut spool) = self.spool.lock() {
            *spool = Vec::new();
        }

        log::debug!("closed {} session", self.mode);
        finished
    }

    /// Archive bytes of a memory-backed session.
    ///
    /// Finishes a pending writer first, so no entries can be added afterwards.
    pub fn to_data(&mut self) -> Result<Vec<u8>> {
        if !matches!(self.store, Some(BackingStore::Memory(_))) {
            return Err(OxiTarError::invalid_state(
                "cannot get binary data from file-based archive",
            ));
        }
        self.finish_writer()?;
        match &self.store {
            Some(BackingStore::Memory(buf)) => Ok(buf.to_vec()),
            _ => Err(OxiTarError::invalid_state("memory buffer is gone")),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(OxiTarError::archive_closed())
        } else {
            Ok(())
        }
    }

    pub(crate) fn ensure_mode(&self, mode: SessionMode) -> Result<()> {
        self.ensure_open()?;
        if self.mode == mode {
            Ok(())
        } else {
            Err(OxiTarError::invalid_state(format!(
                "operation requires {mode} mode, session is in {} mode",
                self.mode
            )))
        }
    }

    pub(crate) fn describe_store(&self) -> String {
        self.store
            .as_ref()
            .map_or_else(|| "<released>".to_string(), BackingStore::describe)
    }

    pub(crate) fn open_reader(&mut self) -> Result<()> {
        let source = match &self.store {
            Some(BackingStore::Path(path)) => {
                let file = File::open(path)
                    .map_err(|e| OxiTarError::open(path.display().to_string(), e))?;
                PullSource::File(BufReader::with_capacity(TAR_BUFFER_SIZE, file))
            }
            Some(BackingStore::Memory(buf)) => PullSource::Memory(buf.cursor()),
            Some(BackingStore::Input(source)) => PullSource::Stream(PullBridge::new(
                Arc::clone(source),
                Arc::clone(&self.spool),
                self.fault.clone(),
            )),
            Some(BackingStore::Output(_)) => {
                return Err(OxiTarError::invalid_state("an output stream cannot be read"));
            }
            None => return Err(OxiTarError::archive_closed()),
        };

        let filter = self.fault.surface(FilterReader::new(source))?;
        self.method = filter.method();
        self.reader = Some(TarReader::new(filter));
        Ok(())
    }

    pub(crate) fn open_writer(&mut self) -> Result<()> {
        let target = match &self.store {
            Some(BackingStore::Path(path)) => {
                let file = File::create(path)
                    .map_err(|e| OxiTarError::open(path.display().to_string(), e))?;
                PushTarget::File(BufWriter::with_capacity(TAR_BUFFER_SIZE, file))
            }
            Some(BackingStore::Memory(_)) => PushTarget::Memory(Vec::new()),
            Some(BackingStore::Output(sink)) => {
                PushTarget::Stream(PushBridge::new(Arc::clone(sink), self.fault.clone()))
            }
            Some(BackingStore::Input(_)) => {
                return Err(OxiTarError::invalid_state("an input stream cannot be written"));
            }
            None => return Err(OxiTarError::archive_closed()),
        };

        let filter = FilterWriter::new(target, self.method, self.level)?;
        self.writer = Some(TarWriter::new(filter, self.format));
        Ok(())
    }

    fn finish_writer(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let filter = self.fault.surface(writer.finish())?;
        let target = self.fault.surface_io(filter.finish())?;

        if let PushTarget::Memory(data) = target {
            self.store = Some(BackingStore::Memory(MemoryBuffer::from(data)));
        }
        Ok(())
    }

    pub(crate) fn reader_mut(&mut self) -> Result<&mut ArchiveReader> {
        self.ensure_open()?;
        self.reader
            .as_mut()
            .ok_or_else(|| OxiTarError::invalid_state("archive is not open for reading"))
    }

    pub(crate) fn writer_mut(&mut self) -> Result<&mut ArchiveWriter> {
        self.ensure_open()?;
        self.writer
            .as_mut()
            .ok_or_else(|| OxiTarError::invalid_state("archive is not open for writing"))
    }

    /// Advance to the next header.
    pub(crate) fn next_entry(&mut self) -> Result<Option<EntryMetadata>> {
        let result = self.reader_mut()?.next_header();
        self.fault.surface(result)
    }

    /// Read payload bytes of the current entry.
    pub(crate) fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = self.reader_mut()?.read_data(buf);
        self.fault.surface(result)
    }

    /// Write a header plus its complete payload.
    pub(crate) fn write_entry(&mut self, meta: &EntryMetadata, data: &[u8]) -> Result<()> {
        let writer = self.writer_mut()?;
        let result = writer
            .write_header(meta)
            .and_then(|()| writer.write_data(data).map(drop));
        self.fault.surface(result)
    }

    pub(crate) fn store_path(&self) -> Option<PathBuf> {
        self.path().map(Path::to_path_buf)
    }
}

impl Drop for ArchiveSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("error closing archive session: {err}");
        }
    }
}

impl std::fmt::Debug for ArchiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("store", &self.describe_store())
            .field("mode", &self.mode)
            .field("compression", &self.method)
            .field("format", &self.format)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AddOptions;
    use oxitar_core::ErrorClass;

    #[test]
    fn test_memory_session_lifecycle() {
        let mut session = ArchiveSession::new_in_memory(SessionOptions::default()).unwrap();
        assert_eq!(session.mode(), SessionMode::Write);
        assert_eq!(session.compression(), CompressionMethod::None);
        assert_eq!(session.format(), TarFormat::Pax);
        assert!(session.path().is_none());

        session.add("a.txt", b"alpha", &AddOptions::default()).unwrap();
        let data = session.to_data().unwrap();
        assert_eq!(data.len() % 512, 0);
        // to_data is repeatable once the writer is finished
        assert_eq!(session.to_data().unwrap(), data);

        let err = session.add("b.txt", b"beta", &AddOptions::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidState);

        session.close().unwrap();
        session.close().unwrap();
        assert!(session.is_closed());
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        let mut session = ArchiveSession::new_in_memory(SessionOptions::default()).unwrap();
        session.close().unwrap();
        let err = session.add("x", b"", &AddOptions::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::ClosedStream);
        assert_eq!(err.to_string(), "archive is closed");
    }

    #[test]
    fn test_mode_mismatches() {
        let sink: SharedSink = Arc::new(Mutex::new(Vec::<u8>::new()));
        let err = ArchiveSession::open(
            BackingStore::Output(sink),
            SessionMode::Read,
            SessionOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidState);

        let err = ArchiveSession::open(
            BackingStore::Memory(MemoryBuffer::new()),
            SessionMode::Append,
            SessionOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidState);

        let mut session = ArchiveSession::new_in_memory(SessionOptions::default()).unwrap();
        assert!(session.rescan().is_err());
        assert!(session.entries().is_err());
    }

    #[test]
    fn test_missing_file_is_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveSession::open_path(
            dir.path().join("absent.tar"),
            SessionMode::Read,
            SessionOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.class(), ErrorClass::OpenFailure);
    }

    #[test]
    fn test_to_data_requires_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ArchiveSession::open_path(
            dir.path().join("out.tar"),
            SessionMode::Write,
            SessionOptions::default(),
        )
        .unwrap();
        let err = session.to_data().unwrap_err();
        assert!(err.to_string().contains("file-based archive"));
    }

    #[test]
    fn test_suffix_selects_compression() {
        let dir = tempfile::tempdir().unwrap();
        let session = ArchiveSession::open_path(
            dir.path().join("out.tar.zst"),
            SessionMode::Write,
            SessionOptions::default(),
        )
        .unwrap();
        assert_eq!(session.compression(), CompressionMethod::Zstd);

        let session = ArchiveSession::open_path(
            dir.path().join("plain.tar.zst"),
            SessionMode::Write,
            SessionOptions::new().with_compression(CompressionMethod::Xz),
        )
        .unwrap();
        assert_eq!(session.compression(), CompressionMethod::Xz);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("append".parse::<SessionMode>().unwrap(), SessionMode::Append);
        assert_eq!("r".parse::<SessionMode>().unwrap(), SessionMode::Read);
        assert!("delete".parse::<SessionMode>().is_err());
        assert_eq!(SessionMode::Write.to_string(), "write");
    }
}
