//! Forward-only tar reader.

use super::header::TarHeader;
use super::{
    BLOCK_SIZE, GNU_LONGLINK, GNU_LONGNAME, MAX_EXTENSION_SIZE, PAX_GLOBAL_HEADER, PAX_HEADER,
    join_time, parse_pax_data, parse_pax_time,
};
use oxitar_core::error::{OxiTarError, Result};
use oxitar_core::{EntryKind, EntryMetadata};
use std::collections::HashMap;
use std::io::{self, Read};

/// TAR archive reader.
///
/// Entries are visited strictly in archive order. Call
/// [`next_header`](Self::next_header) to advance, then optionally
/// [`read_data`](Self::read_data) to stream the payload. Unread payload is
/// skipped automatically on the next advance.
pub struct TarReader<R: Read> {
    inner: R,
    remaining: u64,
    padding: u64,
    global_pax: HashMap<String, String>,
    finished: bool,
}

impl<R: Read> TarReader<R> {
    /// Create a new TAR reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            padding: 0,
            global_pax: HashMap::new(),
            finished: false,
        }
    }

    /// Advance to the next entry.
    ///
    /// Returns `Ok(None)` at the end-of-archive marker or at a clean end of
    /// input on a block boundary.
    pub fn next_header(&mut self) -> Result<Option<EntryMetadata>> {
        if self.finished {
            return Ok(None);
        }
        self.skip_data()?;

        let mut local_pax: Option<HashMap<String, String>> = None;
        let mut long_name: Option<String> = None;
        let mut long_link: Option<String> = None;

        loop {
            let Some(block) = self.read_block()? else {
                self.finished = true;
                return Ok(None);
            };
            let Some(header) = TarHeader::from_block(&block)? else {
                self.finished = true;
                return Ok(None);
            };

            match header.typeflag {
                PAX_HEADER => {
                    let data = self.read_extension(&header)?;
                    local_pax = Some(parse_pax_data(&data)?);
                    continue;
                }
                PAX_GLOBAL_HEADER => {
                    let data = self.read_extension(&header)?;
                    self.global_pax.extend(parse_pax_data(&data)?);
                    continue;
                }
                GNU_LONGNAME => {
                    long_name = Some(Self::extension_string(self.read_extension(&header)?));
                    continue;
                }
                GNU_LONGLINK => {
                    long_link = Some(Self::extension_string(self.read_extension(&header)?));
                    continue;
                }
                _ => {}
            }

            let (meta, data_size) = self.build_metadata(header, local_pax.as_ref(), long_name, long_link)?;
            self.remaining = data_size;
            self.padding = Self::padding_for(data_size);
            return Ok(Some(meta));
        }
    }

    /// Read payload bytes of the current entry. Returns 0 at end of data.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.remaining) as usize;
        let n = loop {
            match self.inner.read(&mut buf[..want]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            return Err(OxiTarError::format(
                "truncated tar archive: entry data ends early",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }

    /// Discard the rest of the current entry's payload and padding.
    pub fn skip_data(&mut self) -> Result<()> {
        let total = self.remaining + self.padding;
        if total == 0 {
            return Ok(());
        }
        let skipped = io::copy(&mut (&mut self.inner).take(total), &mut io::sink())?;
        if skipped < total {
            return Err(OxiTarError::format(
                "truncated tar archive: entry data ends early",
            ));
        }
        self.remaining = 0;
        self.padding = 0;
        Ok(())
    }

    /// Payload bytes left in the current entry.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the reader and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read one block; `None` on a clean end of input.
    fn read_block(&mut self) -> Result<Option<[u8; BLOCK_SIZE]>> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.inner.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            BLOCK_SIZE => Ok(Some(block)),
            _ => Err(OxiTarError::format("truncated tar archive: partial header block")),
        }
    }

    /// Read header data (for PAX extended headers and GNU long name/link).
    fn read_extension(&mut self, header: &TarHeader) -> Result<Vec<u8>> {
        if header.size > MAX_EXTENSION_SIZE {
            return Err(OxiTarError::format(format!(
                "tar extension header too large: {} bytes",
                header.size
            )));
        }
        let mut data = vec![0u8; header.size as usize];
        self.inner.read_exact(&mut data).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                OxiTarError::format("truncated tar archive: extension header ends early")
            }
            _ => e.into(),
        })?;
        self.remaining = 0;
        self.padding = Self::padding_for(header.size);
        self.skip_data()?;
        Ok(data)
    }

    fn extension_string(data: Vec<u8>) -> String {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        String::from_utf8_lossy(&data[..end]).into_owned()
    }

    fn padding_for(size: u64) -> u64 {
        let block = BLOCK_SIZE as u64;
        (block - size % block) % block
    }

    /// Merge header fields, global and local pax records, and GNU long
    /// names into entry metadata. Returns the metadata and the number of
    /// payload bytes that follow.
    fn build_metadata(
        &self,
        header: TarHeader,
        local_pax: Option<&HashMap<String, String>>,
        long_name: Option<String>,
        long_link: Option<String>,
    ) -> Result<(EntryMetadata, u64)> {
        let kind = header.entry_kind();
        let has_data = header.has_data();

        let mut meta = EntryMetadata {
            name: long_name.unwrap_or(header.name),
            size: header.size,
            modified: Some(join_time(header.mtime, 0)),
            accessed: header.atime.map(|t| join_time(t, 0)),
            created: header.ctime.map(|t| join_time(t, 0)),
            mode: header.mode & 0o7777,
            uid: header.uid,
            gid: header.gid,
            uname: Some(header.uname).filter(|s| !s.is_empty()),
            gname: Some(header.gname).filter(|s| !s.is_empty()),
            // Hardlinks keep a regular raw type; kind() reports them.
            file_type: if kind == EntryKind::Hardlink { EntryKind::File } else { kind },
            symlink_target: None,
            hardlink_target: None,
            devmajor: None,
            devminor: None,
            typeflag: (kind == EntryKind::Unknown).then_some(header.typeflag),
        };
        let mut link = long_link.unwrap_or(header.linkname);

        for attrs in [Some(&self.global_pax), local_pax].into_iter().flatten() {
            Self::apply_pax(&mut meta, &mut link, attrs)?;
        }

        match kind {
            EntryKind::Hardlink => meta.hardlink_target = Some(link),
            EntryKind::Symlink => meta.symlink_target = Some(link),
            EntryKind::CharDevice | EntryKind::BlockDevice => {
                meta.devmajor = Some(header.devmajor);
                meta.devminor = Some(header.devminor);
            }
            _ => {}
        }

        if !has_data {
            meta.size = 0;
        }
        let data_size = meta.size;
        Ok((meta, data_size))
    }

    /// Apply PAX extended attributes.
    fn apply_pax(
        meta: &mut EntryMetadata,
        link: &mut String,
        attrs: &HashMap<String, String>,
    ) -> Result<()> {
        if let Some(path) = attrs.get("path") {
            meta.name = path.clone();
        }
        if let Some(linkpath) = attrs.get("linkpath") {
            *link = linkpath.clone();
        }
        if let Some(size) = attrs.get("size") {
            meta.size = size
                .trim()
                .parse()
                .map_err(|_| OxiTarError::format(format!("invalid pax size: {:?}", size)))?;
        }
        if let Some(uid) = attrs.get("uid").and_then(|v| v.trim().parse().ok()) {
            meta.uid = uid;
        }
        if let Some(gid) = attrs.get("gid").and_then(|v| v.trim().parse().ok()) {
            meta.gid = gid;
        }
        if let Some(uname) = attrs.get("uname") {
            meta.uname = Some(uname.clone());
        }
        if let Some(gname) = attrs.get("gname") {
            meta.gname = Some(gname.clone());
        }
        if let Some(t) = attrs.get("mtime").and_then(|v| parse_pax_time(v)) {
            meta.modified = Some(t);
        }
        if let Some(t) = attrs.get("atime").and_then(|v| parse_pax_time(v)) {
            meta.accessed = Some(t);
        }
        if let Some(t) = attrs.get("ctime").and_then(|v| parse_pax_time(v)) {
            meta.created = Some(t);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tar::HeaderFlavor;
    use std::io::Cursor;

    /// Create a minimal TAR archive by hand.
    fn create_test_tar() -> Vec<u8> {
        let mut tar = vec![0u8; BLOCK_SIZE * 4];

        let name = b"test.txt";
        tar[..name.len()].copy_from_slice(name);
        tar[100..107].copy_from_slice(b"0000644");
        tar[108..115].copy_from_slice(b"0001750");
        tar[116..123].copy_from_slice(b"0001750");
        // Size: 13 bytes
        tar[124..135].copy_from_slice(b"00000000015");
        tar[136..147].copy_from_slice(b"14723456700");
        tar[156] = b'0';

        tar[148..156].copy_from_slice(b"        ");
        let checksum: u32 = tar[..BLOCK_SIZE].iter().map(|&b| b as u32).sum();
        let checksum_str = format!("{:06o}\0 ", checksum);
        tar[148..156].copy_from_slice(checksum_str.as_bytes());

        let data = b"Hello, TAR!\n\0";
        tar[BLOCK_SIZE..BLOCK_SIZE + data.len()].copy_from_slice(data);
        tar
    }

    fn header_block(header: &TarHeader) -> Vec<u8> {
        header.to_block().unwrap().to_vec()
    }

    fn padded(data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        out.resize(data.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
        out
    }

    #[test]
    fn test_tar_reader() {
        let mut reader = TarReader::new(Cursor::new(create_test_tar()));
        let entry = reader.next_header().unwrap().unwrap();
        assert_eq!(entry.name, "test.txt");
        assert_eq!(entry.size, 13);
        assert_eq!(entry.mode, 0o644);
        assert_eq!(entry.uid, 1000);
        assert_eq!(entry.kind(), EntryKind::File);

        let mut buf = [0u8; 64];
        let n = reader.read_data(&mut buf).unwrap();
        assert_eq!(n, 13);
        assert_eq!(&buf[..12], b"Hello, TAR!\n");
        assert_eq!(reader.read_data(&mut buf).unwrap(), 0);

        assert!(reader.next_header().unwrap().is_none());
        assert!(reader.next_header().unwrap().is_none());
    }

    #[test]
    fn test_unread_data_is_skipped() {
        let mut archive = create_test_tar();
        archive.truncate(BLOCK_SIZE * 2);
        archive.extend(create_test_tar());
        let mut reader = TarReader::new(Cursor::new(archive));
        assert!(reader.next_header().unwrap().is_some());
        let second = reader.next_header().unwrap().unwrap();
        assert_eq!(second.name, "test.txt");
        assert_eq!(reader.remaining(), 13);
    }

    #[test]
    fn test_truncated_data_is_format_error() {
        let mut archive = create_test_tar();
        archive.truncate(BLOCK_SIZE + 5);
        let mut reader = TarReader::new(Cursor::new(archive));
        reader.next_header().unwrap().unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(reader.read_data(&mut buf).unwrap(), 5);
        let err = reader.read_data(&mut buf).unwrap_err();
        assert_eq!(err.class(), oxitar_core::ErrorClass::FormatFailure);
    }

    #[test]
    fn test_partial_header_block() {
        let mut reader = TarReader::new(Cursor::new(vec![b'a'; 100]));
        assert!(reader.next_header().is_err());
    }

    #[test]
    fn test_pax_overrides_and_globals() {
        let mut archive = Vec::new();

        let global = super::super::format_pax_record("uname", "builder");
        let mut g = TarHeader::new(HeaderFlavor::Ustar);
        g.name = "pax_global_header".to_string();
        g.typeflag = PAX_GLOBAL_HEADER;
        g.size = global.len() as u64;
        archive.extend(header_block(&g));
        archive.extend(padded(global.as_bytes()));

        let long = format!("{}/leaf.txt", "deep".repeat(40));
        let mut records = super::super::format_pax_record("path", &long);
        records.push_str(&super::super::format_pax_record("mtime", "1700000000.5"));
        let mut x = TarHeader::new(HeaderFlavor::Ustar);
        x.name = "PaxHeader/leaf.txt".to_string();
        x.typeflag = PAX_HEADER;
        x.size = records.len() as u64;
        archive.extend(header_block(&x));
        archive.extend(padded(records.as_bytes()));

        let mut file = TarHeader::new(HeaderFlavor::Ustar);
        file.name = "leaf.txt".to_string();
        file.size = 3;
        archive.extend(header_block(&file));
        archive.extend(padded(b"abc"));

        let mut second = TarHeader::new(HeaderFlavor::Ustar);
        second.name = "second".to_string();
        archive.extend(header_block(&second));
        archive.extend(vec![0u8; BLOCK_SIZE * 2]);

        let mut reader = TarReader::new(Cursor::new(archive));
        let first = reader.next_header().unwrap().unwrap();
        assert_eq!(first.name, long);
        assert_eq!(first.uname.as_deref(), Some("builder"));
        assert_eq!(
            first.modified,
            Some(join_time(1_700_000_000, 500_000_000))
        );

        let next = reader.next_header().unwrap().unwrap();
        assert_eq!(next.name, "second");
        // Global records persist, local ones do not.
        assert_eq!(next.uname.as_deref(), Some("builder"));
        assert_eq!(next.modified, Some(join_time(0, 0)));
    }

    #[test]
    fn test_gnu_long_name_and_link() {
        let name = "n".repeat(180);
        let target = "t".repeat(150);
        let mut archive = Vec::new();
        for (flag, value) in [(GNU_LONGNAME, &name), (GNU_LONGLINK, &target)] {
            let mut ext = TarHeader::new(HeaderFlavor::Gnu);
            ext.name = "././@LongLink".to_string();
            ext.typeflag = flag;
            ext.size = value.len() as u64 + 1;
            archive.extend(header_block(&ext));
            let mut data = value.as_bytes().to_vec();
            data.push(0);
            archive.extend(padded(&data));
        }
        let mut link = TarHeader::new(HeaderFlavor::Gnu);
        link.name = name[..100].to_string();
        link.linkname = target[..100].to_string();
        link.typeflag = b'2';
        archive.extend(header_block(&link));

        let mut reader = TarReader::new(Cursor::new(archive));
        let entry = reader.next_header().unwrap().unwrap();
        assert_eq!(entry.name, name);
        assert_eq!(entry.symlink_target.as_deref(), Some(target.as_str()));
        assert!(entry.is_symlink());
        assert!(reader.next_header().unwrap().is_none());
    }

    #[test]
    fn test_hardlink_entry_metadata() {
        let mut h = TarHeader::new(HeaderFlavor::Ustar);
        h.name = "copy".to_string();
        h.linkname = "orig".to_string();
        h.typeflag = b'1';
        let mut reader = TarReader::new(Cursor::new(header_block(&h)));
        let entry = reader.next_header().unwrap().unwrap();
        assert_eq!(entry.file_type, EntryKind::File);
        assert_eq!(entry.kind(), EntryKind::Hardlink);
        assert_eq!(entry.link_target(), Some("orig"));
        assert_eq!(entry.size, 0);
    }

    #[test]
    fn test_device_numbers() {
        let mut h = TarHeader::new(HeaderFlavor::Ustar);
        h.name = "dev/tty".to_string();
        h.typeflag = b'3';
        h.devmajor = 5;
        h.devminor = 1;
        let mut reader = TarReader::new(Cursor::new(header_block(&h)));
        let entry = reader.next_header().unwrap().unwrap();
        assert_eq!(entry.kind(), EntryKind::CharDevice);
        assert_eq!(entry.device_numbers(), Some((5, 1)));
    }
}
