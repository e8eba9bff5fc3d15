//! Adding entries to write and append sessions.

use crate::options::{AddOptions, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_SYMLINK_MODE};
use crate::session::{ArchiveSession, TAR_BUFFER_SIZE};
use crate::stream::EntryWriter;
use oxitar_core::{EntryKind, EntryMetadata, OxiTarError, Result};
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;

impl ArchiveSession {
    /// Add a regular file from memory.
    pub fn add(&mut self, name: &str, data: &[u8], options: &AddOptions) -> Result<()> {
        let meta = options.apply(EntryMetadata::file(name, data.len() as u64), DEFAULT_FILE_MODE);
        self.write_entry(&meta, data)
    }

    /// Add a regular file holding `text` in the given encoding (UTF-8 by default).
    pub fn add_text(
        &mut self,
        name: &str,
        text: &str,
        encoding: Option<&str>,
        options: &AddOptions,
    ) -> Result<()> {
        let encoding = crate::text::lookup(encoding)?;
        let data = crate::text::encode(encoding, text)?;
        self.add(name, &data, options)
    }

    /// Add a file, directory or link from the filesystem under `name`.
    ///
    /// Type, permission bits, times and ownership come from the source; any
    /// field set in `options` wins. Symbolic links are stored as links unless
    /// `dereference_symlinks` is set.
    pub fn add_file(&mut self, name: &str, path: impl AsRef<Path>, options: &AddOptions) -> Result<()> {
        let path = path.as_ref();
        self.writer_mut()?;

        let stat = if options.dereference_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        }
        .map_err(|e| stat_error(path, e))?;

        let meta = metadata_from_fs(name, path, &stat, options)?;
        if !meta.is_file() {
            return self.write_entry(&meta, &[]);
        }

        let mut file = File::open(path).map_err(|e| stat_error(path, e))?;
        let writer = self.writer_mut()?;
        let header = writer.write_header(&meta);
        self.fault.surface(header)?;

        let mut buffer = vec![0u8; TAR_BUFFER_SIZE];
        let mut left = meta.size;
        while left > 0 {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                log::warn!("{} shrank while being archived", path.display());
                break;
            }
            let n = n.min(usize::try_from(left).unwrap_or(usize::MAX));
            let result = self.writer_mut()?.write_data(&buffer[..n]);
            self.fault.surface(result)?;
            left -= n as u64;
        }
        Ok(())
    }

    /// Add a directory entry. A trailing `/` is appended when missing.
    pub fn add_directory(&mut self, name: &str, options: &AddOptions) -> Result<()> {
        let meta = options.apply(EntryMetadata::directory(directory_name(name)), DEFAULT_DIR_MODE);
        self.write_entry(&meta, &[])
    }

    /// Add a symbolic link pointing at `target`.
    pub fn add_symlink(&mut self, name: &str, target: &str, options: &AddOptions) -> Result<()> {
        let meta = options.apply(EntryMetadata::symlink(name, target), DEFAULT_SYMLINK_MODE);
        self.write_entry(&meta, &[])
    }

    /// Add a hard link to the earlier entry `target`.
    pub fn add_hardlink(&mut self, name: &str, target: &str, options: &AddOptions) -> Result<()> {
        let meta = options.apply(EntryMetadata::hardlink(name, target), DEFAULT_FILE_MODE);
        self.write_entry(&meta, &[])
    }

    /// Start a regular file whose payload is written incrementally.
    pub fn open_output_stream(&mut self, name: &str, options: &AddOptions) -> Result<EntryWriter<'_>> {
        self.writer_mut()?;
        Ok(EntryWriter::new(self, name.to_string(), options.clone()))
    }
}

fn directory_name(name: &str) -> String {
    if name.is_empty() || name.ends_with('/') {
        name.to_string()
    } else {
        format!("{name}/")
    }
}

fn stat_error(path: &Path, err: io::Error) -> OxiTarError {
    OxiTarError::Io(io::Error::new(
        err.kind(),
        format!("cannot read '{}': {err}", path.display()),
    ))
}

fn metadata_from_fs(
    name: &str,
    path: &Path,
    stat: &Metadata,
    options: &AddOptions,
) -> Result<EntryMetadata> {
    let file_type = stat.file_type();
    let mut meta = if file_type.is_dir() {
        EntryMetadata::directory(directory_name(name))
    } else if file_type.is_symlink() {
        let target = fs::read_link(path).map_err(|e| stat_error(path, e))?;
        EntryMetadata::symlink(name, target.to_string_lossy())
    } else if file_type.is_file() {
        EntryMetadata::file(name, stat.len())
    } else {
        special_entry(name, stat).ok_or_else(|| {
            OxiTarError::format(format!("'{}' has an unsupported file type", path.display()))
        })?
    };

    meta.modified = stat.modified().ok();
    meta.accessed = stat.accessed().ok();
    meta.mode = fs_mode(&meta, stat);
    fill_owner(&mut meta, stat);

    if !options.preserve_permissions {
        meta.mode = match meta.kind() {
            EntryKind::Directory => DEFAULT_DIR_MODE,
            EntryKind::Symlink => DEFAULT_SYMLINK_MODE,
            _ => DEFAULT_FILE_MODE,
        };
    }
    if let Some(mode) = options.mode {
        meta.mode = mode;
    }
    if let Some(uid) = options.uid.filter(|&uid| uid > 0) {
        meta.uid = uid;
    }
    if let Some(gid) = options.gid.filter(|&gid| gid > 0) {
        meta.gid = gid;
    }
    if options.uname.is_some() {
        meta.uname.clone_from(&options.uname);
    }
    if options.gname.is_some() {
        meta.gname.clone_from(&options.gname);
    }
    if options.modified.is_some() {
        meta.modified = options.modified;
    }
    Ok(meta)
}

#[cfg(unix)]
fn fs_mode(_meta: &EntryMetadata, stat: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    stat.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn fs_mode(meta: &EntryMetadata, stat: &Metadata) -> u32 {
    match meta.kind() {
        EntryKind::Directory => DEFAULT_DIR_MODE,
        EntryKind::Symlink => DEFAULT_SYMLINK_MODE,
        _ if stat.permissions().readonly() => 0o444,
        _ => DEFAULT_FILE_MODE,
    }
}

#[cfg(unix)]
fn fill_owner(meta: &mut EntryMetadata, stat: &Metadata) {
    use std::os::unix::fs::MetadataExt;
    meta.uid = u64::from(stat.uid());
    meta.gid = u64::from(stat.gid());
}

#[cfg(not(unix))]
fn fill_owner(_meta: &mut EntryMetadata, _stat: &Metadata) {}

#[cfg(unix)]
fn special_entry(name: &str, stat: &Metadata) -> Option<EntryMetadata> {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    let file_type = stat.file_type();
    let kind = if file_type.is_fifo() {
        EntryKind::Fifo
    } else if file_type.is_char_device() {
        EntryKind::CharDevice
    } else if file_type.is_block_device() {
        EntryKind::BlockDevice
    } else {
        return None;
    };

    let mut meta = EntryMetadata::file(name, 0);
    meta.file_type = kind;
    if kind.is_device() {
        let (major, minor) = split_device(stat.rdev());
        meta.devmajor = Some(major);
        meta.devminor = Some(minor);
    }
    Some(meta)
}

#[cfg(not(unix))]
fn special_entry(_name: &str, _stat: &Metadata) -> Option<EntryMetadata> {
    None
}

#[cfg(all(unix, not(target_os = "macos")))]
fn split_device(dev: u64) -> (u32, u32) {
    let major = ((dev >> 32) & 0xffff_f000) | ((dev >> 8) & 0x0000_0fff);
    let minor = ((dev >> 12) & 0xffff_ff00) | (dev & 0x0000_00ff);
    (major as u32, minor as u32)
}

#[cfg(target_os = "macos")]
fn split_device(dev: u64) -> (u32, u32) {
    (((dev >> 24) & 0xff) as u32, (dev & 0x00ff_ffff) as u32)
}
