//! TAR archive format support.
//!
//! This module provides forward-only reading and writing of TAR archives with
//! support for:
//! - V7 (pre-POSIX) headers
//! - UStar format (POSIX.1-1988)
//! - PAX extended headers (POSIX.1-2001) for long names and additional metadata
//! - GNU long name/long link records and base-256 numeric fields
//!
//! The reader never seeks: each call to [`TarReader::next_header`] skips
//! whatever remains of the previous entry, so the same code drives files,
//! memory buffers, decompressors and sockets.

mod header;
mod reader;
mod writer;

pub use header::{HeaderFlavor, TarHeader};
pub use reader::TarReader;
pub use writer::TarWriter;

use oxitar_core::error::{OxiTarError, Result};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// TAR block size.
pub const BLOCK_SIZE: usize = 512;

/// PAX typeflag for extended header (applies to next file only).
pub(crate) const PAX_HEADER: u8 = b'x';

/// PAX typeflag for global extended header (applies to all subsequent files).
pub(crate) const PAX_GLOBAL_HEADER: u8 = b'g';

/// GNU LongName typeflag.
pub(crate) const GNU_LONGNAME: u8 = b'L';

/// GNU LongLink typeflag.
pub(crate) const GNU_LONGLINK: u8 = b'K';

/// Upper bound for PAX and GNU long-name payloads.
pub(crate) const MAX_EXTENSION_SIZE: u64 = 1 << 20;

/// Tar sub-format used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum TarFormat {
    /// POSIX.1-1988 ustar.
    Ustar,
    /// POSIX.1-2001 pax (ustar plus extended headers).
    #[default]
    Pax,
    /// GNU tar.
    Gnu,
    /// Seventh Edition Unix tar.
    V7,
}

impl TarFormat {
    /// All formats, in declaration order.
    pub const ALL: [Self; 4] = [Self::Ustar, Self::Pax, Self::Gnu, Self::V7];

    /// Lowercase format name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ustar => "ustar",
            Self::Pax => "pax",
            Self::Gnu => "gnu",
            Self::V7 => "v7",
        }
    }
}

impl std::fmt::Display for TarFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TarFormat {
    type Err = OxiTarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ustar" => Ok(Self::Ustar),
            "pax" | "posix" => Ok(Self::Pax),
            "gnu" | "gnutar" => Ok(Self::Gnu),
            "v7" => Ok(Self::V7),
            _ => Err(OxiTarError::unsupported_method(s)),
        }
    }
}

/// Parse PAX extended header data.
/// Format: "length key=value\n" repeated
pub fn parse_pax_data(data: &[u8]) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    let mut pos = 0;

    while pos < data.len() {
        // Trailing NUL padding ends the record list
        if data[pos] == 0 {
            break;
        }

        let space_pos = data[pos..]
            .iter()
            .position(|&b| b == b' ')
            .map(|p| pos + p)
            .ok_or_else(|| OxiTarError::format("malformed pax record: missing length"))?;

        let record_len: usize = std::str::from_utf8(&data[pos..space_pos])
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| OxiTarError::format("malformed pax record: bad length"))?;

        let record_end = pos + record_len;
        if record_len == 0 || record_end > data.len() || record_end <= space_pos + 1 {
            return Err(OxiTarError::format("malformed pax record: length out of range"));
        }

        let mut value_end = record_end;
        if data[value_end - 1] == b'\n' {
            value_end -= 1;
        }
        let record = &data[space_pos + 1..value_end];

        if let Some(eq_pos) = record.iter().position(|&b| b == b'=') {
            let key = String::from_utf8_lossy(&record[..eq_pos]).into_owned();
            let value = String::from_utf8_lossy(&record[eq_pos + 1..]).into_owned();
            attrs.insert(key, value);
        }

        pos = record_end;
    }

    Ok(attrs)
}

/// Format a single PAX record: "len key=value\n"
pub fn format_pax_record(key: &str, value: &str) -> String {
    // The length counts its own digits.
    let base_len = key.len() + value.len() + 3;
    let mut total_len = base_len + 1;
    loop {
        let expected = base_len + total_len.to_string().len();
        if expected == total_len {
            break;
        }
        total_len = expected;
    }
    format!("{} {}={}\n", total_len, key, value)
}

/// Split a timestamp into whole seconds and nanoseconds since the epoch.
pub(crate) fn split_time(time: SystemTime) -> (i64, u32) {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(e) => {
            let before = e.duration();
            let secs = before.as_secs() as i64;
            match before.subsec_nanos() {
                0 => (-secs, 0),
                n => (-secs - 1, 1_000_000_000 - n),
            }
        }
    }
}

/// Inverse of [`split_time`].
pub(crate) fn join_time(secs: i64, nanos: u32) -> SystemTime {
    let time = if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs as u64, nanos))
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(secs.unsigned_abs()))
            .and_then(|t| t.checked_add(Duration::from_nanos(u64::from(nanos))))
    };
    // Out-of-range header values clamp to the epoch.
    time.unwrap_or(UNIX_EPOCH)
}

/// Parse a PAX time value such as `1700000000.25` or `-3.5`.
pub(crate) fn parse_pax_time(value: &str) -> Option<SystemTime> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    let secs: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos: u32 = 0;
    let mut scale = 100_000_000;
    for c in frac.chars().take(9) {
        nanos += c.to_digit(10)? * scale;
        scale /= 10;
    }
    if !negative {
        return Some(join_time(secs, nanos));
    }
    if nanos == 0 {
        Some(join_time(-secs, 0))
    } else {
        Some(join_time(-secs - 1, 1_000_000_000 - nanos))
    }
}

/// Format a timestamp as a PAX time value.
pub(crate) fn format_pax_time(time: SystemTime) -> String {
    let (secs, nanos) = split_time(time);
    if nanos == 0 {
        return secs.to_string();
    }
    let (secs, nanos) = if secs < 0 {
        (secs + 1, 1_000_000_000 - nanos)
    } else {
        (secs, nanos)
    };
    let sign = if secs == 0 && time < UNIX_EPOCH { "-" } else { "" };
    let frac = format!("{:09}", nanos);
    format!("{}{}.{}", sign, secs, frac.trim_end_matches('0'))
}
