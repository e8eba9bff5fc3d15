//! Backing stores and the byte bridges between stores and the codec.
//!
//! A session reads through a [`PullSource`] and writes through a
//! [`PushTarget`]. Files and memory buffers map straight onto std types.
//! Caller streams go through a bridge that talks to the shared
//! [`ByteSource`] / [`ByteSink`] handle. When a stream fails, the bridge
//! parks the structured error in a [`FaultSlot`] and hands the codec a plain
//! `io::Error`, so the session can report the original failure afterwards.

use oxitar_core::{ByteSink, ByteSource, OxiTarError, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A caller-owned input stream shared with a session.
pub type SharedSource = Arc<Mutex<dyn ByteSource + Send>>;

/// A caller-owned output stream shared with a session.
pub type SharedSink = Arc<Mutex<dyn ByteSink + Send>>;

/// Wrap any byte source for use as a session store.
pub fn shared_source<S: ByteSource + Send + 'static>(source: S) -> SharedSource {
    Arc::new(Mutex::new(source))
}

/// Wrap any byte sink for use as a session store.
pub fn shared_sink<S: ByteSink + Send + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Immutable archive bytes owned by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBuffer {
    data: Arc<[u8]>,
}

impl MemoryBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// View the bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy the bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub(crate) fn cursor(&self) -> Cursor<Arc<[u8]>> {
        Cursor::new(Arc::clone(&self.data))
    }
}

impl From<Vec<u8>> for MemoryBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<&[u8]> for MemoryBuffer {
    fn from(data: &[u8]) -> Self {
        Self { data: data.into() }
    }
}

/// Where a session's archive bytes live.
pub enum BackingStore {
    /// A file on disk, opened by path.
    Path(PathBuf),
    /// A buffer owned by the session.
    Memory(MemoryBuffer),
    /// A caller stream to read from.
    Input(SharedSource),
    /// A caller stream to write to.
    Output(SharedSink),
}

impl BackingStore {
    /// Short description for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Memory(buf) => format!("<memory: {} bytes>", buf.len()),
            Self::Input(_) => "<input stream>".to_string(),
            Self::Output(_) => "<output stream>".to_string(),
        }
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Holds the first structured error raised by a stream bridge.
#[derive(Clone, Default)]
pub(crate) struct FaultSlot(Arc<Mutex<Option<OxiTarError>>>);

impl FaultSlot {
    fn park(&self, err: OxiTarError) {
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert(err);
        }
    }

    pub(crate) fn take(&self) -> Option<OxiTarError> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Replace a codec error with the parked stream error, if one exists.
    pub(crate) fn surface<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.take().unwrap_or(err))
    }

    /// Same as [`surface`](Self::surface) for plain I/O results.
    pub(crate) fn surface_io<T>(&self, result: io::Result<T>) -> Result<T> {
        result.map_err(|err| self.take().unwrap_or(OxiTarError::Io(err)))
    }
}

fn poisoned(what: &str) -> io::Error {
    io::Error::other(format!("{what} lock poisoned"))
}

/// Pulls from a shared source, remembering every byte for rescans.
///
/// The spool is shared across bridges of one session. A fresh bridge replays
/// the spooled prefix before pulling live bytes again.
pub(crate) struct PullBridge {
    source: SharedSource,
    spool: Arc<Mutex<Vec<u8>>>,
    position: usize,
    fault: FaultSlot,
}

impl PullBridge {
    pub(crate) fn new(source: SharedSource, spool: Arc<Mutex<Vec<u8>>>, fault: FaultSlot) -> Self {
        Self {
            source,
            spool,
            position: 0,
            fault,
        }
    }
}

impl Read for PullBridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut spool = self.spool.lock().map_err(|_| poisoned("replay spool"))?;

        if self.position < spool.len() {
            let n = buf.len().min(spool.len() - self.position);
            buf[..n].copy_from_slice(&spool[self.position..self.position + n]);
            self.position += n;
            return Ok(n);
        }

        let pulled = {
            let mut source = self.source.lock().map_err(|_| poisoned("input stream"))?;
            source.pull(buf)
        };
        match pulled {
            Ok(n) => {
                spool.extend_from_slice(&buf[..n]);
                self.position += n;
                Ok(n)
            }
            Err(err) => {
                let message = err.to_string();
                self.fault.park(err);
                Err(io::Error::other(format!("input stream failed: {message}")))
            }
        }
    }
}

/// Pushes into a shared sink.
pub(crate) struct PushBridge {
    sink: SharedSink,
    fault: FaultSlot,
}

impl PushBridge {
    pub(crate) fn new(sink: SharedSink, fault: FaultSlot) -> Self {
        Self { sink, fault }
    }

    fn relay(&self, op: impl FnOnce(&mut (dyn ByteSink + Send)) -> Result<()>) -> io::Result<()> {
        let mut sink = self.sink.lock().map_err(|_| poisoned("output stream"))?;
        op(&mut *sink).map_err(|err| {
            let message = err.to_string();
            self.fault.park(err);
            io::Error::other(format!("output stream failed: {message}"))
        })
    }
}

impl Write for PushBridge {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.relay(|sink| sink.push(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.relay(|sink| ByteSink::flush(sink))
    }
}

/// The read side of a session's store.
pub(crate) enum PullSource {
    File(BufReader<File>),
    Memory(Cursor<Arc<[u8]>>),
    Stream(PullBridge),
}

impl Read for PullSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(r) => r.read(buf),
            Self::Memory(r) => r.read(buf),
            Self::Stream(r) => r.read(buf),
        }
    }
}

/// The write side of a session's store.
pub(crate) enum PushTarget {
    File(BufWriter<File>),
    Memory(Vec<u8>),
    Stream(PushBridge),
}

impl Write for PushTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(w) => w.write(buf),
            Self::Memory(w) => w.write(buf),
            Self::Stream(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::File(w) => w.write_all(buf),
            Self::Memory(w) => w.write_all(buf),
            Self::Stream(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(w) => Write::flush(w),
            Self::Memory(w) => Write::flush(w),
            Self::Stream(w) => Write::flush(w),
        }
    }
}
