//! Create and append command implementations.

use crate::utils::archive_name;
use oxitar::{
    AddOptions, ArchiveSession, CompressionMethod, SessionMode, SessionOptions, TarFormat,
    shared_sink,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Options for writing a new archive.
pub struct CreateOptions {
    pub compression: Option<CompressionMethod>,
    pub level: Option<u32>,
    pub format: TarFormat,
    pub verbose: bool,
}

impl CreateOptions {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            compression: self.compression,
            level: self.level,
            format: self.format,
        }
    }
}

pub fn cmd_create(
    archive: &str,
    files: &[PathBuf],
    options: &CreateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if files.is_empty() {
        return Err("no input files given".into());
    }

    // "-" writes the archive to stdout
    let mut session = if archive == "-" {
        ArchiveSession::to_sink(shared_sink(io::stdout()), options.session_options())?
    } else {
        ArchiveSession::open_path(archive, SessionMode::Write, options.session_options())?
    };

    let added = add_paths(&mut session, files, options.verbose)?;
    let compression = session.compression();
    session.close()?;

    if options.verbose {
        eprintln!("Created {archive} ({compression}, {} format) with {added} entries", options.format);
    }
    Ok(())
}

pub fn cmd_append(
    archive: &Path,
    files: &[PathBuf],
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if files.is_empty() {
        return Err("no input files given".into());
    }

    let mut session = ArchiveSession::open_path(archive, SessionMode::Append, SessionOptions::default())?;
    let added = add_paths(&mut session, files, verbose)?;
    session.close()?;

    if verbose {
        eprintln!("Appended {added} entries to {}", archive.display());
    }
    Ok(())
}

/// Add each path, recursing into directories. Returns the number of entries added.
pub fn add_paths(
    session: &mut ArchiveSession,
    files: &[PathBuf],
    verbose: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut added = 0;
    for root in files {
        added += add_path(session, root, root, verbose)?;
    }
    Ok(added)
}

fn add_path(
    session: &mut ArchiveSession,
    path: &Path,
    root: &Path,
    verbose: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let name = archive_name(path, root);
    session.add_file(&name, path, &AddOptions::default())?;
    if verbose {
        eprintln!("  Added: {name}");
    }

    let mut added = 1;
    if fs::symlink_metadata(path)?.is_dir() {
        let mut children = fs::read_dir(path)?.collect::<Result<Vec<_>, _>>()?;
        children.sort_by_key(|entry| entry.file_name());
        for child in children {
            added += add_path(session, &child.path(), root, verbose)?;
        }
    }
    Ok(added)
}
