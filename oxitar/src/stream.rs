//! Streaming adapters over a single entry.
//!
//! [`EntryReader`] pulls one entry's payload through the session's reader
//! with a one-byte lookahead. [`EntryWriter`] collects a payload and writes
//! the entry when closed, because a tar header must carry the final size
//! before any data follows.

use crate::options::{AddOptions, DEFAULT_FILE_MODE};
use crate::session::ArchiveSession;
use oxitar_core::{EntryMetadata, OxiTarError, Result};
use std::io;

/// Reads the payload of one entry.
///
/// Borrows the session, so no other operation can move the reader while the
/// stream is alive.
pub struct EntryReader<'a> {
    session: &'a mut ArchiveSession,
    entry: EntryMetadata,
    bytes_read: u64,
    peeked: Option<u8>,
    closed: bool,
}

impl<'a> EntryReader<'a> {
    pub(crate) fn new(session: &'a mut ArchiveSession, entry: EntryMetadata) -> Self {
        Self {
            session,
            entry,
            bytes_read: 0,
            peeked: None,
            closed: false,
        }
    }

    /// Metadata of the entry being read.
    pub fn entry(&self) -> &EntryMetadata {
        &self.entry
    }

    /// Bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether the whole payload has been handed out.
    pub fn is_eof(&self) -> bool {
        self.peeked.is_none() && self.bytes_read >= self.entry.size
    }

    /// Read up to `buf.len()` bytes; 0 at the end of the entry.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(OxiTarError::stream_closed());
        }
        if buf.is_empty() || self.bytes_read >= self.entry.size {
            return Ok(0);
        }

        let mut filled = 0;
        if let Some(byte) = self.peeked.take() {
            buf[0] = byte;
            filled = 1;
        }
        if filled < buf.len() {
            filled += self.session.read_chunk(&mut buf[filled..])?;
        }
        self.bytes_read += filled as u64;
        Ok(filled)
    }

    /// Look at the next byte without consuming it; `None` at the end.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if self.closed {
            return Err(OxiTarError::stream_closed());
        }
        if self.peeked.is_some() {
            return Ok(self.peeked);
        }
        if self.bytes_read >= self.entry.size {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        if self.session.read_chunk(&mut byte)? == 0 {
            return Ok(None);
        }
        self.peeked = Some(byte[0]);
        Ok(self.peeked)
    }

    /// Read everything that is left.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let remaining = self.entry.size.saturating_sub(self.bytes_read);
        let mut out = Vec::with_capacity(crate::catalog::bounded_capacity(remaining));
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    /// Stop reading. Later calls fail.
    pub fn close(&mut self) {
        self.closed = true;
        self.peeked = None;
    }
}

impl io::Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        EntryReader::read(self, buf).map_err(io::Error::from)
    }
}

/// Collects the payload of a new entry and commits it on close.
///
/// Dropping an unclosed writer commits the entry too; a failure at that
/// point can only be logged.
pub struct EntryWriter<'a> {
    session: &'a mut ArchiveSession,
    name: String,
    options: AddOptions,
    buffer: Vec<u8>,
    closed: bool,
}

impl<'a> EntryWriter<'a> {
    pub(crate) fn new(session: &'a mut ArchiveSession, name: String, options: AddOptions) -> Self {
        Self {
            session,
            name,
            options,
            buffer: Vec::new(),
            closed: false,
        }
    }

    /// Name the entry will be stored under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes collected so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append bytes to the pending payload.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(OxiTarError::stream_closed());
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Write the header and payload into the archive.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let data = std::mem::take(&mut self.buffer);
        let meta = self.options.apply(
            EntryMetadata::file(self.name.clone(), data.len() as u64),
            DEFAULT_FILE_MODE,
        );
        self.session.write_entry(&meta, &data)?;
        log::debug!("committed streamed entry '{}' ({} bytes)", self.name, data.len());
        Ok(())
    }
}

impl io::Write for EntryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        EntryWriter::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EntryWriter<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to commit entry '{}': {err}", self.name);
        }
    }
}
