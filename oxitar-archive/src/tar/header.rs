//! 512-byte header block codec.

use super::BLOCK_SIZE;
use oxitar_core::EntryKind;
use oxitar_core::error::{OxiTarError, Result};

/// Magic and version for POSIX ustar headers.
const USTAR_MAGIC: &[u8; 8] = b"ustar\x0000";

/// Magic and version for GNU headers.
const GNU_MAGIC: &[u8; 8] = b"ustar  \x00";

/// Physical layout of a header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFlavor {
    /// No magic; name, link and numeric fields only.
    V7,
    /// POSIX ustar layout with owner names, device numbers and a name prefix.
    Ustar,
    /// GNU layout: ustar fields plus atime/ctime where ustar keeps the prefix.
    Gnu,
}

/// TAR header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    /// Entry name (without the ustar prefix).
    pub name: String,
    /// File mode.
    pub mode: u32,
    /// Owner UID.
    pub uid: u64,
    /// Owner GID.
    pub gid: u64,
    /// Payload size.
    pub size: u64,
    /// Modification time in seconds since the epoch.
    pub mtime: i64,
    /// Type flag.
    pub typeflag: u8,
    /// Link name.
    pub linkname: String,
    /// Block layout.
    pub flavor: HeaderFlavor,
    /// Owner name.
    pub uname: String,
    /// Group name.
    pub gname: String,
    /// Device major number.
    pub devmajor: u32,
    /// Device minor number.
    pub devminor: u32,
    /// Ustar name prefix.
    pub prefix: String,
    /// Access time (GNU only).
    pub atime: Option<i64>,
    /// Status change time (GNU only).
    pub ctime: Option<i64>,
}

impl TarHeader {
    /// Create an empty header of the given layout.
    pub fn new(flavor: HeaderFlavor) -> Self {
        Self {
            name: String::new(),
            mode: 0o644,
            uid: 0,
            gid: 0,
            size: 0,
            mtime: 0,
            typeflag: b'0',
            linkname: String::new(),
            flavor,
            uname: String::new(),
            gname: String::new(),
            devmajor: 0,
            devminor: 0,
            prefix: String::new(),
            atime: None,
            ctime: None,
        }
    }

    /// Read a TAR header from a block.
    ///
    /// Returns `Ok(None)` for an all-zero block (end of archive).
    pub fn from_block(block: &[u8; BLOCK_SIZE]) -> Result<Option<Self>> {
        if block.iter().all(|&b| b == 0) {
            return Ok(None);
        }

        Self::verify_checksum(block)?;

        let flavor = if &block[257..265] == GNU_MAGIC {
            HeaderFlavor::Gnu
        } else if &block[257..262] == b"ustar" {
            HeaderFlavor::Ustar
        } else {
            HeaderFlavor::V7
        };

        let mut header = Self {
            name: Self::parse_string(&block[0..100]),
            mode: Self::parse_numeric(&block[100..108])? as u32,
            uid: Self::parse_numeric(&block[108..116])?,
            gid: Self::parse_numeric(&block[116..124])?,
            size: Self::parse_numeric(&block[124..136])?,
            mtime: Self::parse_signed(&block[136..148])?,
            typeflag: block[156],
            linkname: Self::parse_string(&block[157..257]),
            flavor,
            ..Self::new(flavor)
        };

        if flavor != HeaderFlavor::V7 {
            header.uname = Self::parse_string(&block[265..297]);
            header.gname = Self::parse_string(&block[297..329]);
            header.devmajor = Self::parse_numeric(&block[329..337])? as u32;
            header.devminor = Self::parse_numeric(&block[337..345])? as u32;
        }

        match flavor {
            HeaderFlavor::Ustar => {
                let prefix = Self::parse_string(&block[345..500]);
                if !prefix.is_empty() {
                    header.name = format!("{}/{}", prefix, header.name);
                }
            }
            HeaderFlavor::Gnu => {
                header.atime = Self::parse_optional_time(&block[345..357])?;
                header.ctime = Self::parse_optional_time(&block[357..369])?;
            }
            HeaderFlavor::V7 => {}
        }

        Ok(Some(header))
    }

    /// Convert header to a 512-byte block.
    pub fn to_block(&self) -> Result<[u8; BLOCK_SIZE]> {
        let mut block = [0u8; BLOCK_SIZE];
        let base256 = self.flavor == HeaderFlavor::Gnu;

        Self::write_field(&mut block[0..100], &self.name, "name")?;
        Self::write_numeric(&mut block[100..108], u64::from(self.mode), base256, "mode")?;
        Self::write_numeric(&mut block[108..116], self.uid, base256, "uid")?;
        Self::write_numeric(&mut block[116..124], self.gid, base256, "gid")?;
        Self::write_numeric(&mut block[124..136], self.size, base256, "size")?;
        Self::write_time(&mut block[136..148], self.mtime, base256)?;
        block[156] = self.typeflag;
        Self::write_field(&mut block[157..257], &self.linkname, "linkname")?;

        match self.flavor {
            HeaderFlavor::V7 => {}
            HeaderFlavor::Ustar | HeaderFlavor::Gnu => {
                let magic = if base256 { GNU_MAGIC } else { USTAR_MAGIC };
                block[257..265].copy_from_slice(magic);
                // Owner names must stay NUL-terminated.
                Self::write_field(&mut block[265..296], &self.uname, "uname")?;
                Self::write_field(&mut block[297..328], &self.gname, "gname")?;
                Self::write_numeric(&mut block[329..337], u64::from(self.devmajor), base256, "devmajor")?;
                Self::write_numeric(&mut block[337..345], u64::from(self.devminor), base256, "devminor")?;
            }
        }

        match self.flavor {
            HeaderFlavor::Ustar => Self::write_field(&mut block[345..500], &self.prefix, "prefix")?,
            HeaderFlavor::Gnu => {
                if let Some(atime) = self.atime {
                    Self::write_time(&mut block[345..357], atime, true)?;
                }
                if let Some(ctime) = self.ctime {
                    Self::write_time(&mut block[357..369], ctime, true)?;
                }
            }
            HeaderFlavor::V7 => {}
        }

        // Calculate and write checksum
        block[148..156].copy_from_slice(b"        ");
        let checksum: u32 = block.iter().map(|&b| u32::from(b)).sum();
        let checksum_str = format!("{:06o}\0 ", checksum);
        block[148..156].copy_from_slice(checksum_str.as_bytes());

        Ok(block)
    }

    /// Get entry type.
    pub fn entry_kind(&self) -> EntryKind {
        match self.typeflag {
            b'0' | 0 | b'7' => {
                // Old archives mark directories with a trailing slash only.
                if self.flavor == HeaderFlavor::V7 && self.name.ends_with('/') {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                }
            }
            b'1' => EntryKind::Hardlink,
            b'2' => EntryKind::Symlink,
            b'3' => EntryKind::CharDevice,
            b'4' => EntryKind::BlockDevice,
            b'5' | b'D' => EntryKind::Directory,
            b'6' => EntryKind::Fifo,
            _ => EntryKind::Unknown,
        }
    }

    /// Whether payload blocks follow this header.
    pub fn has_data(&self) -> bool {
        !matches!(self.typeflag, b'1' | b'2' | b'3' | b'4' | b'5' | b'6')
    }

    /// Split a path into a ustar (prefix, name) pair.
    ///
    /// Returns `None` when the path cannot be represented in the 155-byte
    /// prefix plus 100-byte name fields.
    pub fn split_ustar_path(path: &str) -> Option<(&str, &str)> {
        if path.len() <= 100 {
            return Some(("", path));
        }
        path.char_indices()
            .filter(|&(i, c)| c == '/' && i > 0 && i <= 155)
            .map(|(i, _)| i)
            .find(|&i| {
                let rest = path.len() - i - 1;
                rest > 0 && rest <= 100
            })
            .map(|i| (&path[..i], &path[i + 1..]))
    }

    fn verify_checksum(block: &[u8; BLOCK_SIZE]) -> Result<()> {
        let stored = Self::parse_numeric(&block[148..156])?;
        let mut unsigned: u64 = 0;
        let mut signed: i64 = 0;
        for (i, &b) in block.iter().enumerate() {
            let b = if (148..156).contains(&i) { b' ' } else { b };
            unsigned += u64::from(b);
            signed += i64::from(b as i8);
        }
        if stored == unsigned || stored as i64 == signed {
            Ok(())
        } else {
            Err(OxiTarError::format(format!(
                "header checksum mismatch: stored {:o}, computed {:o}",
                stored, unsigned
            )))
        }
    }

    /// Parse a null-terminated string.
    fn parse_string(data: &[u8]) -> String {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        String::from_utf8_lossy(&data[..end]).into_owned()
    }

    /// Parse an octal or base-256 number.
    fn parse_numeric(data: &[u8]) -> Result<u64> {
        if data[0] & 0x80 != 0 {
            if data[0] == 0xff {
                return Err(OxiTarError::format("negative value in unsigned header field"));
            }
            let mut value = u64::from(data[0] & 0x7f);
            for &b in &data[1..] {
                if value > u64::MAX >> 8 {
                    return Err(OxiTarError::format("base-256 header field overflows"));
                }
                value = (value << 8) | u64::from(b);
            }
            return Ok(value);
        }
        Self::parse_octal(data)
    }

    /// Parse a possibly negative time field.
    fn parse_signed(data: &[u8]) -> Result<i64> {
        if data[0] == 0xff {
            let mut value: i64 = -1;
            for &b in &data[1..] {
                value = (value << 8) | i64::from(b);
            }
            return Ok(value);
        }
        let value = Self::parse_numeric(data)?;
        i64::try_from(value).map_err(|_| OxiTarError::format("time field out of range"))
    }

    fn parse_optional_time(data: &[u8]) -> Result<Option<i64>> {
        if data.iter().all(|&b| b == 0) {
            return Ok(None);
        }
        Self::parse_signed(data).map(Some)
    }

    /// Parse an octal number.
    fn parse_octal(data: &[u8]) -> Result<u64> {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        let s = std::str::from_utf8(&data[..end])
            .map_err(|_| OxiTarError::format("non-ASCII octal header field"))?
            .trim();
        if s.is_empty() {
            return Ok(0);
        }
        u64::from_str_radix(s, 8)
            .map_err(|_| OxiTarError::format(format!("invalid octal header field: {:?}", s)))
    }

    /// Copy a string into a field, failing if it does not fit.
    fn write_field(field: &mut [u8], s: &str, what: &str) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() > field.len() {
            return Err(OxiTarError::format(format!(
                "{} too long for tar header ({} > {} bytes): {}",
                what,
                bytes.len(),
                field.len(),
                s
            )));
        }
        field[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Write an octal number (NUL-terminated) or, if allowed, base-256.
    fn write_numeric(field: &mut [u8], value: u64, base256: bool, what: &str) -> Result<()> {
        let digits = field.len() - 1;
        if digits * 3 >= 64 || value < 1u64 << (digits * 3) {
            let s = format!("{:0width$o}", value, width = digits);
            field[..digits].copy_from_slice(s.as_bytes());
            field[digits] = 0;
            return Ok(());
        }
        if !base256 {
            return Err(OxiTarError::format(format!(
                "{} value {} does not fit in tar header field",
                what, value
            )));
        }
        let len = field.len();
        let avail = (len - 1).min(8);
        if avail < 8 && value >> (avail * 8) != 0 {
            return Err(OxiTarError::format(format!(
                "{} value {} does not fit in tar header field",
                what, value
            )));
        }
        field.fill(0);
        field[len - avail..].copy_from_slice(&value.to_be_bytes()[8 - avail..]);
        field[0] |= 0x80;
        Ok(())
    }

    fn write_time(field: &mut [u8], secs: i64, base256: bool) -> Result<()> {
        if secs >= 0 {
            return Self::write_numeric(field, secs as u64, base256, "time");
        }
        if !base256 {
            return Err(OxiTarError::format("negative time needs a GNU or pax header"));
        }
        field.fill(0xff);
        let len = field.len();
        field[len - 8..].copy_from_slice(&secs.to_be_bytes());
        Ok(())
    }
}
