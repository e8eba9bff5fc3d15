//! Extracting a whole archive into a directory.
//!
//! Every entry name and link target is checked with [`is_safe_path`] before
//! anything is created for that entry. The first unsafe path stops the run;
//! entries already written stay on disk.

use crate::options::ExtractOptions;
use crate::safe_path::is_safe_path;
use crate::session::{ArchiveSession, TAR_BUFFER_SIZE};
use filetime::FileTime;
use oxitar_core::{EntryKind, EntryMetadata, OxiTarError, PathContext, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

impl ArchiveSession {
    /// Extract every entry below `options.destination`.
    ///
    /// Returns the number of entries written. Device, fifo and socket entries
    /// are skipped with a warning and not counted. Directory permissions and
    /// times are applied last so read-only directories can still be filled.
    pub fn extract_all(&mut self, options: &ExtractOptions) -> Result<usize> {
        self.rescan()?;

        let root = options.destination.as_path();
        if options.create_directories {
            fs::create_dir_all(root)?;
        }
        if options.strip_count > 0 {
            log::debug!("strip_count {} is not applied", options.strip_count);
        }

        let mut directories: Vec<(PathBuf, EntryMetadata)> = Vec::new();
        let mut written = 0;

        while let Some(meta) = self.next_entry()? {
            check_paths(&meta)?;
            let target = root.join(&meta.name);

            match meta.kind() {
                EntryKind::Directory => {
                    fs::create_dir_all(&target)?;
                    directories.push((target.clone(), meta));
                }
                EntryKind::File | EntryKind::Unknown => {
                    prepare_parent(&target, options)?;
                    self.write_payload(&target, options)?;
                    apply_metadata(&target, &meta, options, false)?;
                }
                EntryKind::Symlink => {
                    prepare_parent(&target, options)?;
                    let link = meta.symlink_target.as_deref().unwrap_or_default();
                    if !create_symlink(link, &target, options)? {
                        continue;
                    }
                    apply_metadata(&target, &meta, options, true)?;
                }
                EntryKind::Hardlink => {
                    prepare_parent(&target, options)?;
                    let source = root.join(meta.hardlink_target.as_deref().unwrap_or_default());
                    replace_existing(&target, options)?;
                    fs::hard_link(&source, &target)?;
                }
                EntryKind::CharDevice | EntryKind::BlockDevice | EntryKind::Fifo | EntryKind::Socket => {
                    log::warn!("skipping {} entry '{}'", meta.kind(), meta.name);
                    continue;
                }
            }
            log::debug!("extracted {}", target.display());
            written += 1;
        }

        // Children first, so a parent's mode cannot block them.
        for (path, meta) in directories.iter().rev() {
            apply_metadata(path, meta, options, false)?;
        }

        log::debug!("extracted {written} entries into {}", root.display());
        Ok(written)
    }

    fn write_payload(&mut self, target: &Path, options: &ExtractOptions) -> Result<()> {
        let file = if options.overwrite {
            File::create(target)?
        } else {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(target)
                .map_err(|e| exists_error(target, e))?
        };

        let mut out = BufWriter::with_capacity(TAR_BUFFER_SIZE, file);
        let mut buffer = vec![0u8; TAR_BUFFER_SIZE];
        loop {
            let n = self.read_chunk(&mut buffer)?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])?;
        }
        out.flush()?;
        Ok(())
    }
}

fn check_paths(meta: &EntryMetadata) -> Result<()> {
    if !is_safe_path(&meta.name) {
        return Err(OxiTarError::path_traversal(&meta.name, PathContext::Entry));
    }
    let unsafe_target = |target: &Option<String>| {
        target.as_deref().filter(|t| !is_safe_path(t)).map(str::to_string)
    };
    if let Some(target) = unsafe_target(&meta.hardlink_target) {
        return Err(OxiTarError::path_traversal(target, PathContext::HardlinkTarget));
    }
    if let Some(target) = unsafe_target(&meta.symlink_target) {
        return Err(OxiTarError::path_traversal(target, PathContext::SymlinkTarget));
    }
    Ok(())
}

fn prepare_parent(target: &Path, options: &ExtractOptions) -> Result<()> {
    if !options.create_directories {
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn exists_error(target: &Path, err: io::Error) -> OxiTarError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        OxiTarError::Io(io::Error::new(
            err.kind(),
            format!("'{}' already exists", target.display()),
        ))
    } else {
        OxiTarError::Io(err)
    }
}

/// Make room for a link. Without `overwrite` an existing target is an error.
fn replace_existing(target: &Path, options: &ExtractOptions) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(_) if !options.overwrite => Err(exists_error(
            target,
            io::Error::from(io::ErrorKind::AlreadyExists),
        )),
        Ok(stat) if stat.is_dir() => Ok(fs::remove_dir(target)?),
        Ok(_) => Ok(fs::remove_file(target)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn create_symlink(link: &str, target: &Path, options: &ExtractOptions) -> Result<bool> {
    replace_existing(target, options)?;
    std::os::unix::fs::symlink(link, target)?;
    Ok(true)
}

#[cfg(not(unix))]
fn create_symlink(link: &str, target: &Path, _options: &ExtractOptions) -> Result<bool> {
    log::warn!("skipping symlink {} -> {link}", target.display());
    Ok(false)
}

fn apply_metadata(
    path: &Path,
    meta: &EntryMetadata,
    options: &ExtractOptions,
    is_link: bool,
) -> Result<()> {
    if options.preserve_ownership {
        apply_owner(path, meta, is_link);
    }
    if options.preserve_permissions && !is_link {
        apply_mode(path, meta.mode)?;
    }
    if let Some(modified) = meta.modified.filter(|_| options.preserve_times) {
        let mtime = FileTime::from_system_time(modified);
        let atime = meta.accessed.map_or(mtime, FileTime::from_system_time);
        if is_link {
            filetime::set_symlink_file_times(path, atime, mtime)?;
        } else {
            filetime::set_file_times(path, atime, mtime)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(unix)]
fn apply_owner(path: &Path, meta: &EntryMetadata, is_link: bool) {
    let (Ok(uid), Ok(gid)) = (u32::try_from(meta.uid), u32::try_from(meta.gid)) else {
        log::warn!("owner {}:{} of {} is out of range", meta.uid, meta.gid, path.display());
        return;
    };
    let result = if is_link {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid))
    } else {
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
    };
    if let Err(err) = result {
        log::warn!("cannot set owner of {}: {err}", path.display());
    }
}

#[cfg(not(unix))]
fn apply_owner(_path: &Path, _meta: &EntryMetadata, _is_link: bool) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_paths_order() {
        let meta = EntryMetadata::file("../evil", 0);
        let err = check_paths(&meta).unwrap_err();
        assert!(err.to_string().contains("entry with unsafe path: '../evil'"));

        let meta = EntryMetadata::hardlink("ok", "/etc/shadow");
        let err = check_paths(&meta).unwrap_err();
        assert!(err.to_string().contains("hardlink target"));

        let meta = EntryMetadata::symlink("ok", "../../up");
        let err = check_paths(&meta).unwrap_err();
        assert!(err.to_string().contains("symlink target"));
        assert!(err.is_security());

        assert!(check_paths(&EntryMetadata::symlink("ok", "sibling/file")).is_ok());
    }

    #[test]
    fn test_replace_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        fs::write(&path, b"x").unwrap();

        let keep = ExtractOptions {
            overwrite: false,
            ..ExtractOptions::new(dir.path())
        };
        assert!(replace_existing(&path, &keep).is_err());
        assert!(path.exists());

        replace_existing(&path, &ExtractOptions::new(dir.path())).unwrap();
        assert!(!path.exists());
        replace_existing(&path, &ExtractOptions::new(dir.path())).unwrap();
    }
}
