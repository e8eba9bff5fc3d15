//! Streaming tar writer.

use super::header::{HeaderFlavor, TarHeader};
use super::{BLOCK_SIZE, GNU_LONGLINK, GNU_LONGNAME, PAX_GLOBAL_HEADER, PAX_HEADER, TarFormat, format_pax_record, format_pax_time, split_time};
use oxitar_core::error::{OxiTarError, Result};
use oxitar_core::{EntryKind, EntryMetadata};
use std::io::Write;

const ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Largest value an 11-digit octal field holds, plus one.
const OCTAL_11: u64 = 1 << 33;

/// Largest value a 7-digit octal field holds, plus one.
const OCTAL_7: u64 = 1 << 21;

/// TAR archive writer.
///
/// Each entry is a [`write_header`](Self::write_header) call followed by
/// exactly `size` bytes of [`write_data`](Self::write_data). Block padding
/// and the end-of-archive marker are handled here. The writer has no
/// `Drop` side effects: call [`finish`](Self::finish) to terminate the
/// archive.
pub struct TarWriter<W: Write> {
    inner: W,
    format: TarFormat,
    remaining: u64,
    padding: u64,
}

impl<W: Write> TarWriter<W> {
    /// Create a new TAR writer.
    pub fn new(inner: W, format: TarFormat) -> Self {
        Self {
            inner,
            format,
            remaining: 0,
            padding: 0,
        }
    }

    /// The sub-format headers are written in.
    pub fn format(&self) -> TarFormat {
        self.format
    }

    /// Start a new entry.
    ///
    /// Only regular files and unknown entries carry payload; `meta.size` is ignored for every
    /// other kind. Any unwritten payload of the previous entry is zero-filled.
    pub fn write_header(&mut self, meta: &EntryMetadata) -> Result<()> {
        self.finish_entry()?;

        let kind = meta.kind();
        let (typeflag, link) = match kind {
            EntryKind::File => (b'0', ""),
            EntryKind::Hardlink => (b'1', meta.hardlink_target.as_deref().unwrap_or("")),
            EntryKind::Symlink => (b'2', meta.symlink_target.as_deref().unwrap_or("")),
            EntryKind::CharDevice => (b'3', ""),
            EntryKind::BlockDevice => (b'4', ""),
            EntryKind::Directory => (b'5', ""),
            EntryKind::Fifo => (b'6', ""),
            EntryKind::Unknown => match meta.typeflag {
                Some(flag) if is_foreign_typeflag(flag) => (flag, ""),
                _ => return Err(unstorable(meta)),
            },
            EntryKind::Socket => return Err(unstorable(meta)),
        };
        let data_size = match kind {
            EntryKind::File | EntryKind::Unknown => meta.size,
            _ => 0,
        };

        let mut header = TarHeader {
            name: meta.name.clone(),
            mode: meta.mode & 0o7777,
            uid: meta.uid,
            gid: meta.gid,
            size: data_size,
            mtime: meta.modified.map(|t| split_time(t).0).unwrap_or(0),
            typeflag,
            linkname: link.to_string(),
            uname: meta.uname.clone().unwrap_or_default(),
            gname: meta.gname.clone().unwrap_or_default(),
            devmajor: meta.devmajor.unwrap_or(0),
            devminor: meta.devminor.unwrap_or(0),
            ..TarHeader::new(HeaderFlavor::Ustar)
        };

        match self.format {
            TarFormat::V7 => {
                if kind.is_device() || kind == EntryKind::Fifo {
                    return Err(OxiTarError::format(format!(
                        "v7 tar cannot store {} entries: {}",
                        kind, meta.name
                    )));
                }
                header.flavor = HeaderFlavor::V7;
                header.mtime = header.mtime.max(0);
            }
            TarFormat::Ustar => {
                let (prefix, name) = TarHeader::split_ustar_path(&meta.name).ok_or_else(|| {
                    OxiTarError::format(format!("name too long for ustar: {}", meta.name))
                })?;
                header.prefix = prefix.to_string();
                header.name = name.to_string();
                header.mtime = header.mtime.max(0);
            }
            TarFormat::Gnu => {
                header.flavor = HeaderFlavor::Gnu;
                header.atime = meta.accessed.map(|t| split_time(t).0);
                header.ctime = meta.created.map(|t| split_time(t).0);
                if header.name.len() > 100 {
                    self.write_gnu_long(GNU_LONGNAME, &meta.name)?;
                    header.name = truncate_str(&meta.name, 100).to_string();
                }
                if header.linkname.len() > 100 {
                    self.write_gnu_long(GNU_LONGLINK, link)?;
                    header.linkname = truncate_str(link, 100).to_string();
                }
            }
            TarFormat::Pax => {
                let records = Self::pax_records(meta, &mut header);
                if !records.is_empty() {
                    self.write_pax_header(&meta.name, header.mtime, &records)?;
                }
            }
        }

        self.inner.write_all(&header.to_block()?)?;
        self.remaining = data_size;
        self.padding = padding_for(data_size);
        Ok(())
    }

    /// Write payload bytes for the current entry.
    ///
    /// Returns the number of bytes accepted, which is less than
    /// `data.len()` once the declared size is reached.
    pub fn write_data(&mut self, data: &[u8]) -> Result<usize> {
        let n = (data.len() as u64).min(self.remaining) as usize;
        self.inner.write_all(&data[..n])?;
        self.remaining -= n as u64;
        Ok(n)
    }

    /// Write a complete entry; the size is taken from `data`.
    pub fn add_entry(&mut self, meta: &EntryMetadata, data: &[u8]) -> Result<()> {
        let mut meta = meta.clone();
        meta.size = data.len() as u64;
        self.write_header(&meta)?;
        self.write_data(data)?;
        Ok(())
    }

    /// Payload bytes still expected for the current entry.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Get a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Finish the archive by writing two zero blocks and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.finish_entry()?;
        self.inner.write_all(&ZERO_BLOCK)?;
        self.inner.write_all(&ZERO_BLOCK)?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Zero-fill any missing payload and pad to the block boundary.
    fn finish_entry(&mut self) -> Result<()> {
        if self.remaining > 0 {
            log::warn!(
                "tar entry ended {} bytes short of its declared size; zero-filling",
                self.remaining
            );
        }
        let mut pending = self.remaining + self.padding;
        while pending > 0 {
            let n = pending.min(BLOCK_SIZE as u64) as usize;
            self.inner.write_all(&ZERO_BLOCK[..n])?;
            pending -= n as u64;
        }
        self.remaining = 0;
        self.padding = 0;
        Ok(())
    }

    /// Collect the pax records `header` cannot hold, and make `header`
    /// itself ustar-safe.
    fn pax_records(meta: &EntryMetadata, header: &mut TarHeader) -> String {
        let mut records = String::new();

        match TarHeader::split_ustar_path(&meta.name) {
            Some((prefix, name)) if meta.name.is_ascii() => {
                header.prefix = prefix.to_string();
                header.name = name.to_string();
            }
            _ => {
                records.push_str(&format_pax_record("path", &meta.name));
                header.name = truncate_str(&meta.name, 100).to_string();
            }
        }

        if header.linkname.len() > 100 || !header.linkname.is_ascii() {
            records.push_str(&format_pax_record("linkpath", &header.linkname));
            header.linkname = truncate_str(&header.linkname, 100).to_string();
        }

        if header.size >= OCTAL_11 {
            records.push_str(&format_pax_record("size", &header.size.to_string()));
            header.size = 0;
        }
        if header.uid >= OCTAL_7 {
            records.push_str(&format_pax_record("uid", &header.uid.to_string()));
            header.uid = 0;
        }
        if header.gid >= OCTAL_7 {
            records.push_str(&format_pax_record("gid", &header.gid.to_string()));
            header.gid = 0;
        }
        if header.uname.len() > 31 || !header.uname.is_ascii() {
            records.push_str(&format_pax_record("uname", &header.uname));
            header.uname = truncate_str(&header.uname, 31).to_string();
        }
        if header.gname.len() > 31 || !header.gname.is_ascii() {
            records.push_str(&format_pax_record("gname", &header.gname));
            header.gname = truncate_str(&header.gname, 31).to_string();
        }

        if let Some(modified) = meta.modified {
            let (secs, nanos) = split_time(modified);
            if secs < 0 || secs as u64 >= OCTAL_11 || nanos != 0 {
                records.push_str(&format_pax_record("mtime", &format_pax_time(modified)));
            }
            header.mtime = if secs < 0 || secs as u64 >= OCTAL_11 { 0 } else { secs };
        }
        if let Some(accessed) = meta.accessed {
            records.push_str(&format_pax_record("atime", &format_pax_time(accessed)));
        }
        if let Some(created) = meta.created {
            records.push_str(&format_pax_record("ctime", &format_pax_time(created)));
        }

        records
    }

    /// Write a PAX extended header followed by its records.
    fn write_pax_header(&mut self, path: &str, mtime: i64, records: &str) -> Result<()> {
        let base = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("");
        let name = format!("PaxHeader/{}", base);
        let mut pax_header = TarHeader::new(HeaderFlavor::Ustar);
        pax_header.name = truncate_str(&name, 100).to_string();
        pax_header.typeflag = PAX_HEADER;
        pax_header.size = records.len() as u64;
        pax_header.mtime = mtime;

        self.inner.write_all(&pax_header.to_block()?)?;
        self.inner.write_all(records.as_bytes())?;
        self.pad_to_block(records.len() as u64)
    }

    /// Write a GNU long name or long link record.
    fn write_gnu_long(&mut self, typeflag: u8, value: &str) -> Result<()> {
        let mut long_header = TarHeader::new(HeaderFlavor::Gnu);
        long_header.name = "././@LongLink".to_string();
        long_header.typeflag = typeflag;
        long_header.size = value.len() as u64 + 1;

        self.inner.write_all(&long_header.to_block()?)?;
        self.inner.write_all(value.as_bytes())?;
        self.inner.write_all(&[0])?;
        self.pad_to_block(long_header.size)
    }

    fn pad_to_block(&mut self, written: u64) -> Result<()> {
        let pad = padding_for(written) as usize;
        self.inner.write_all(&ZERO_BLOCK[..pad])?;
        Ok(())
    }
}

/// A type flag this writer does not produce itself, so an unknown entry
/// carrying it can be written back verbatim.
fn is_foreign_typeflag(flag: u8) -> bool {
    let header = TarHeader {
        typeflag: flag,
        ..TarHeader::new(HeaderFlavor::Ustar)
    };
    header.entry_kind() == EntryKind::Unknown
        && ![PAX_HEADER, PAX_GLOBAL_HEADER, GNU_LONGNAME, GNU_LONGLINK].contains(&flag)
}

fn unstorable(meta: &EntryMetadata) -> OxiTarError {
    OxiTarError::format(format!("tar cannot store {} entries: {}", meta.kind(), meta.name))
}

fn padding_for(size: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    (block - size % block) % block
}

/// Longest prefix of `s` within `max` bytes, cut on a char boundary.
fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
