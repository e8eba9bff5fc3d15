//! Typed option sets for sessions, added entries and extraction.
//!
//! Each set has sensible defaults and can also be built from a flat
//! key/value map, which is how scripting front ends hand options over.
//! Unknown keys are ignored; known keys with the wrong type or range are
//! rejected with [`OxiTarError::InvalidOption`].

use oxitar_archive::{CompressionMethod, TarFormat};
use oxitar_core::{EntryMetadata, OxiTarError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default permission bits for regular files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Default permission bits for directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default permission bits for symbolic links.
pub const DEFAULT_SYMLINK_MODE: u32 = 0o777;

/// A loosely typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer (modes, ids, levels, counts).
    Int(i64),
    /// String (names, paths, method names).
    Str(String),
    /// Point in time.
    Time(SystemTime),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Time(_) => "time",
        }
    }

    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Int(i) => Ok(*i != 0),
            other => Err(mismatch(key, "boolean", other)),
        }
    }

    fn as_int(&self, key: &str) -> Result<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(mismatch(key, "integer", other)),
        }
    }

    fn as_non_negative(&self, key: &str) -> Result<u64> {
        let value = self.as_int(key)?;
        u64::try_from(value)
            .map_err(|_| OxiTarError::invalid_option(key, format!("{value} must not be negative")))
    }

    fn as_str(&self, key: &str) -> Result<&str> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(mismatch(key, "string", other)),
        }
    }

    fn as_time(&self, key: &str) -> Result<SystemTime> {
        match self {
            Self::Time(t) => Ok(*t),
            // Seconds since the epoch
            Self::Int(secs) => {
                let offset = Duration::from_secs(secs.unsigned_abs());
                let time = if *secs >= 0 {
                    UNIX_EPOCH.checked_add(offset)
                } else {
                    UNIX_EPOCH.checked_sub(offset)
                };
                time.ok_or_else(|| OxiTarError::invalid_option(key, "time out of range"))
            }
            other => Err(mismatch(key, "time", other)),
        }
    }
}

fn mismatch(key: &str, expected: &str, found: &OptionValue) -> OxiTarError {
    OxiTarError::invalid_option(key, format!("expected {expected}, found {}", found.kind()))
}

fn ignore_unknown(scope: &str, key: &str) {
    log::debug!("ignoring unknown {scope} option '{key}'");
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<SystemTime> for OptionValue {
    fn from(value: SystemTime) -> Self {
        Self::Time(value)
    }
}

/// Options used when a session is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Compression for writing. `None` picks it from the path suffix, or no
    /// compression for memory and stream stores. Reading always sniffs.
    pub compression: Option<CompressionMethod>,
    /// Compression level in `1..=9`; out-of-range levels are logged and ignored.
    pub level: Option<u32>,
    /// Tar sub-format for new headers.
    pub format: TarFormat,
}

impl SessionOptions {
    /// Create options with every setting at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression method.
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = Some(method);
        self
    }

    /// Set the compression level.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Set the tar sub-format.
    pub fn with_format(mut self, format: TarFormat) -> Self {
        self.format = format;
        self
    }

    /// Build from a flat map with the keys `compression`, `compression_level`
    /// and `format`.
    pub fn from_map(map: &HashMap<String, OptionValue>) -> Result<Self> {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "compression" => options.compression = Some(value.as_str(key)?.parse()?),
                "compression_level" => {
                    let level = value.as_non_negative(key)?;
                    options.level = Some(u32::try_from(level).map_err(|_| {
                        OxiTarError::invalid_option(key.as_str(), "level out of range")
                    })?);
                }
                "format" => options.format = value.as_str(key)?.parse()?,
                _ => ignore_unknown("session", key),
            }
        }
        Ok(options)
    }
}

/// Metadata overrides for entries added to an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOptions {
    /// Permission bits; each add operation has its own default when unset.
    pub mode: Option<u32>,
    /// Owner id. Zero leaves the entry's owner untouched.
    pub uid: Option<u64>,
    /// Group id. Zero leaves the entry's group untouched.
    pub gid: Option<u64>,
    /// Owner name.
    pub uname: Option<String>,
    /// Group name.
    pub gname: Option<String>,
    /// Modification time; the current time when unset.
    pub modified: Option<SystemTime>,
    /// Keep the source file's permission bits in `add_file`.
    pub preserve_permissions: bool,
    /// Follow symbolic links in `add_file` instead of storing the link.
    pub dereference_symlinks: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            mode: None,
            uid: None,
            gid: None,
            uname: None,
            gname: None,
            modified: None,
            preserve_permissions: true,
            dereference_symlinks: false,
        }
    }
}

impl AddOptions {
    /// Create options with every setting at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set numeric owner and group.
    pub fn with_owner(mut self, uid: u64, gid: u64) -> Self {
        self.uid = Some(uid);
        self.gid = Some(gid);
        self
    }

    /// Set the modification time.
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Build from a flat map.
    ///
    /// Recognized keys: `mode`, `uid`, `gid`, `uname`, `gname`, `modified`
    /// (time or epoch seconds), `preserve_permissions`, `dereference_symlinks`.
    pub fn from_map(map: &HashMap<String, OptionValue>) -> Result<Self> {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "mode" => {
                    let mode = value.as_non_negative(key)?;
                    if mode > 0o7777 {
                        return Err(OxiTarError::invalid_option(
                            key.as_str(),
                            format!("{mode:o} is not a permission mode"),
                        ));
                    }
                    options.mode = Some(mode as u32);
                }
                "uid" => options.uid = Some(value.as_non_negative(key)?),
                "gid" => options.gid = Some(value.as_non_negative(key)?),
                "uname" => options.uname = Some(value.as_str(key)?.to_string()),
                "gname" => options.gname = Some(value.as_str(key)?.to_string()),
                "modified" => options.modified = Some(value.as_time(key)?),
                "preserve_permissions" => options.preserve_permissions = value.as_bool(key)?,
                "dereference_symlinks" => options.dereference_symlinks = value.as_bool(key)?,
                _ => ignore_unknown("add", key),
            }
        }
        Ok(options)
    }

    /// Fill in the overrides on freshly built entry metadata.
    pub(crate) fn apply(&self, mut meta: EntryMetadata, default_mode: u32) -> EntryMetadata {
        meta.mode = self.mode.unwrap_or(default_mode);
        if let Some(uid) = self.uid.filter(|&uid| uid > 0) {
            meta.uid = uid;
        }
        if let Some(gid) = self.gid.filter(|&gid| gid > 0) {
            meta.gid = gid;
        }
        if self.uname.is_some() {
            meta.uname.clone_from(&self.uname);
        }
        if self.gname.is_some() {
            meta.gname.clone_from(&self.gname);
        }
        meta.modified = Some(self.modified.unwrap_or_else(SystemTime::now));
        meta
    }
}

/// Options controlling [`extract_all`](crate::ArchiveSession::extract_all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Directory that receives the entries.
    pub destination: PathBuf,
    /// Apply stored permission bits.
    pub preserve_permissions: bool,
    /// Apply stored uid/gid (usually needs elevated privileges).
    pub preserve_ownership: bool,
    /// Apply stored modification and access times.
    pub preserve_times: bool,
    /// Replace existing files. When false an existing target is an error.
    pub overwrite: bool,
    /// Create missing parent directories.
    pub create_directories: bool,
    /// Leading path components to strip. Accepted but not applied.
    pub strip_count: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("."),
            preserve_permissions: true,
            preserve_ownership: false,
            preserve_times: true,
            overwrite: true,
            create_directories: true,
            strip_count: 0,
        }
    }
}

impl ExtractOptions {
    /// Default options extracting into `destination`.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Build from a flat map.
    ///
    /// Recognized keys: `destination`, `preserve_permissions`,
    /// `preserve_ownership`, `preserve_times`, `overwrite`,
    /// `create_directories`, `strip_count`.
    pub fn from_map(map: &HashMap<String, OptionValue>) -> Result<Self> {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "destination" => options.destination = PathBuf::from(value.as_str(key)?),
                "preserve_permissions" => options.preserve_permissions = value.as_bool(key)?,
                "preserve_ownership" => options.preserve_ownership = value.as_bool(key)?,
                "preserve_times" => options.preserve_times = value.as_bool(key)?,
                "overwrite" => options.overwrite = value.as_bool(key)?,
                "create_directories" => options.create_directories = value.as_bool(key)?,
                "strip_count" => {
                    options.strip_count = usize::try_from(value.as_non_negative(key)?)
                        .map_err(|_| OxiTarError::invalid_option(key.as_str(), "count out of range"))?;
                }
                _ => ignore_unknown("extract", key),
            }
        }
        Ok(options)
    }
}
