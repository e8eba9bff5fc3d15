//! Entry lookup and payload access for read sessions.
//!
//! Every operation here restarts the reader from the first header and walks
//! forward, so results never depend on what an earlier call consumed.

use crate::session::{ArchiveSession, TAR_BUFFER_SIZE};
use crate::stream::EntryReader;
use oxitar_core::{EntryMetadata, OxiTarError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Compare an entry name with a requested name.
///
/// macOS filesystems hand out names in decomposed form, so there both sides
/// are compared after NFD normalization. Elsewhere names match byte for byte.
#[cfg(target_os = "macos")]
pub fn names_equal(a: &str, b: &str) -> bool {
    use unicode_normalization::UnicodeNormalization;
    a == b || a.nfd().eq(b.nfd())
}

/// Compare an entry name with a requested name.
///
/// macOS filesystems hand out names in decomposed form, so there both sides
/// are compared after NFD normalization. Elsewhere names match byte for byte.
#[cfg(not(target_os = "macos"))]
pub fn names_equal(a: &str, b: &str) -> bool {
    a == b
}

/// Initial buffer size for a payload whose header claims `size` bytes.
pub(crate) fn bounded_capacity(size: u64) -> usize {
    usize::try_from(size.min(TAR_BUFFER_SIZE as u64)).unwrap_or(TAR_BUFFER_SIZE)
}

impl ArchiveSession {
    /// All entries in archive order.
    pub fn entries(&mut self) -> Result<Vec<EntryMetadata>> {
        self.rescan()?;
        let mut entries = Vec::new();
        while let Some(meta) = self.next_entry()? {
            entries.push(meta);
        }
        Ok(entries)
    }

    /// Number of entries.
    pub fn count(&mut self) -> Result<usize> {
        self.rescan()?;
        let mut count = 0;
        while self.next_entry()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Whether an entry with this name exists.
    pub fn has_entry(&mut self, name: &str) -> Result<bool> {
        Ok(self.seek_entry(name)?.is_some())
    }

    /// Metadata of the first entry with this name.
    pub fn get_entry(&mut self, name: &str) -> Result<Option<EntryMetadata>> {
        self.seek_entry(name)
    }

    /// Full payload of an entry.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let meta = self.require_entry(name)?;
        let mut data = Vec::with_capacity(bounded_capacity(meta.size));
        let mut buffer = vec![0u8; TAR_BUFFER_SIZE];
        loop {
            let n = self.read_chunk(&mut buffer)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buffer[..n]);
        }
        Ok(data)
    }

    /// Payload of an entry decoded as text.
    ///
    /// `encoding` is a WHATWG label such as `"utf-8"`, `"latin1"` or
    /// `"shift_jis"`; `None` means UTF-8. Malformed input is an error.
    pub fn read_text(&mut self, name: &str, encoding: Option<&str>) -> Result<String> {
        let encoding = crate::text::lookup(encoding)?;
        let data = self.read(name)?;
        crate::text::decode(encoding, &data, name)
    }

    /// Copy an entry's payload into a file.
    ///
    /// `dest` is used as given: no traversal checks apply, the caller chose it.
    pub fn extract_to(&mut self, name: &str, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        self.require_entry(name)?;

        let mut out = BufWriter::with_capacity(TAR_BUFFER_SIZE, File::create(dest)?);
        let mut buffer = vec![0u8; TAR_BUFFER_SIZE];
        loop {
            let n = self.read_chunk(&mut buffer)?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])?;
        }
        out.flush()?;
        log::debug!("extracted '{name}' to {}", dest.display());
        Ok(())
    }

    /// Stream an entry's payload without loading it whole.
    pub fn open_input_stream(&mut self, name: &str) -> Result<EntryReader<'_>> {
        let meta = self.require_entry(name)?;
        Ok(EntryReader::new(self, meta))
    }

    /// Rescan and stop on the first entry named `name`, reader at its payload.
    fn seek_entry(&mut self, name: &str) -> Result<Option<EntryMetadata>> {
        self.rescan()?;
        while let Some(meta) = self.next_entry()? {
            if names_equal(&meta.name, name) {
                return Ok(Some(meta));
            }
        }
        Ok(None)
    }

    fn require_entry(&mut self, name: &str) -> Result<EntryMetadata> {
        self.seek_entry(name)?
            .ok_or_else(|| OxiTarError::entry_not_found(name))
    }
}
