//! Appending to an existing archive file.
//!
//! Tar has no index to patch, and a compressed archive cannot be extended
//! in place, so appending rewrites the file: the old bytes are loaded into
//! memory, the file is recreated, and every old entry is copied into the
//! new writer before the session accepts new entries. The old archive is
//! checked in full before the file is touched, so an unreadable tail or an
//! entry the writer cannot store leaves the file as it was. An I/O failure
//! during the copy still leaves it partially rewritten.

use crate::session::{ArchiveSession, SessionMode, TAR_BUFFER_SIZE};
use oxitar_archive::{FilterReader, TarFormat, TarReader, TarWriter};
use oxitar_core::{OxiTarError, Result};
use std::fs;
use std::io::{self, Cursor};

impl ArchiveSession {
    pub(crate) fn open_append(&mut self) -> Result<()> {
        let path = self
            .store_path()
            .ok_or_else(|| OxiTarError::invalid_state("append requires a file-backed archive"))?;

        let existing = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} does not exist, creating it", path.display());
                self.mode = SessionMode::Write;
                return self.open_writer();
            }
            Err(e) => return Err(OxiTarError::open(path.display().to_string(), e)),
        };

        let count = check_copyable(&existing, self.format())?;
        log::debug!("{} holds {count} entries", path.display());

        let mut source = TarReader::new(FilterReader::new(Cursor::new(existing))?);
        self.open_writer()?;

        let mut buffer = vec![0u8; TAR_BUFFER_SIZE];
        let mut copied = 0usize;
        while let Some(meta) = source.next_header()? {
            let writer = self.writer_mut()?;
            writer.write_header(&meta)?;
            loop {
                let n = source.read_data(&mut buffer)?;
                if n == 0 {
                    break;
                }
                writer.write_data(&buffer[..n])?;
            }
            copied += 1;
        }

        log::debug!("copied {copied} existing entries from {}", path.display());
        Ok(())
    }
}

/// Walk the whole archive and dry-run every header through a writer of the
/// target format. Returns the entry count.
fn check_copyable(existing: &[u8], format: TarFormat) -> Result<usize> {
    let mut reader = TarReader::new(FilterReader::new(Cursor::new(existing))?);
    let mut count = 0;
    while let Some(meta) = reader.next_header()? {
        TarWriter::new(io::sink(), format).write_header(&meta)?;
        reader.skip_data()?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AddOptions, SessionOptions};
    use oxitar_core::{EntryKind, EntryMetadata};

    #[test]
    fn test_append_to_missing_file_becomes_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.tar");

        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Append, SessionOptions::default())
                .unwrap();
        assert_eq!(session.mode(), SessionMode::Write);
        session.add("first.txt", b"1", &AddOptions::default()).unwrap();
        session.close().unwrap();

        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Read, SessionOptions::default()).unwrap();
        assert_eq!(session.count().unwrap(), 1);
    }

    #[test]
    fn test_append_keeps_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.tar");

        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Write, SessionOptions::default())
                .unwrap();
        session.add("a", b"A", &AddOptions::default()).unwrap();
        session.close().unwrap();

        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Append, SessionOptions::default())
                .unwrap();
        assert_eq!(session.mode(), SessionMode::Append);
        session.add("b", b"B", &AddOptions::default()).unwrap();
        session.close().unwrap();

        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Read, SessionOptions::default()).unwrap();
        let names: Vec<String> = session.entries().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_append_to_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.tar");
        std::fs::write(&path, vec![0x41u8; 700]).unwrap();

        let result =
            ArchiveSession::open_path(&path, SessionMode::Append, SessionOptions::default());
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x41u8; 700]);
    }

    #[test]
    fn test_append_copies_vendor_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendor.tar");

        let mut vendor = EntryMetadata::file("vendor", 4);
        vendor.file_type = EntryKind::Unknown;
        vendor.typeflag = Some(b'A');
        let mut writer = TarWriter::new(Vec::new(), TarFormat::Pax);
        writer.add_entry(&EntryMetadata::file("a", 1), b"1").unwrap();
        writer.add_entry(&vendor, b"blob").unwrap();
        std::fs::write(&path, writer.finish().unwrap()).unwrap();

        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Append, SessionOptions::default())
                .unwrap();
        session.add("c", b"3", &AddOptions::default()).unwrap();
        session.close().unwrap();

        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Read, SessionOptions::default()).unwrap();
        let kinds: Vec<(String, EntryKind)> = session
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| (e.name.clone(), e.kind()))
            .collect();
        assert_eq!(
            kinds,
            [
                ("a".to_string(), EntryKind::File),
                ("vendor".to_string(), EntryKind::Unknown),
                ("c".to_string(), EntryKind::File),
            ]
        );
        assert_eq!(session.read("vendor").unwrap(), b"blob");
    }

    #[test]
    fn test_unstorable_entry_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.tar");

        // A pax archive with a name ustar cannot hold
        let mut writer = TarWriter::new(Vec::new(), TarFormat::Pax);
        writer.add_entry(&EntryMetadata::file("ok", 1), b"1").unwrap();
        writer.add_entry(&EntryMetadata::file("x".repeat(200), 1), b"2").unwrap();
        let original = writer.finish().unwrap();
        std::fs::write(&path, &original).unwrap();

        let options = SessionOptions::new().with_format(TarFormat::Ustar);
        assert!(ArchiveSession::open_path(&path, SessionMode::Append, options).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_truncated_archive_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.tar");

        let mut writer = TarWriter::new(Vec::new(), TarFormat::Pax);
        writer.add_entry(&EntryMetadata::file("a", 1), b"1").unwrap();
        writer.add_entry(&EntryMetadata::file("b", 2000), &[7u8; 2000]).unwrap();
        let mut original = writer.finish().unwrap();
        original.truncate(2048);
        std::fs::write(&path, &original).unwrap();

        assert!(
            ArchiveSession::open_path(&path, SessionMode::Append, SessionOptions::default())
                .is_err()
        );
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }
}
