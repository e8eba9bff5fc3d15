//! Extract command implementation.

use crate::utils::matches_filters;
use oxitar::{
    ArchiveSession, EntryKind, ExtractOptions, OxiTarError, PathContext, SessionMode, SessionOptions,
    is_safe_path, names_equal,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Options for extracting an archive.
pub struct ExtractArgs<'a> {
    pub output: &'a Path,
    pub files: &'a [String],
    pub include: &'a [String],
    pub exclude: &'a [String],
    pub keep_existing: bool,
    pub no_preserve: bool,
    pub verbose: bool,
}

impl ExtractArgs<'_> {
    fn is_selective(&self) -> bool {
        !self.files.is_empty() || !self.include.is_empty() || !self.exclude.is_empty()
    }

    fn selects(&self, name: &str) -> bool {
        let named = self.files.is_empty() || self.files.iter().any(|f| names_equal(f, name));
        named && matches_filters(name, self.include, self.exclude)
    }
}

pub fn cmd_extract(archive: &Path, args: &ExtractArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = ArchiveSession::open_path(archive, SessionMode::Read, SessionOptions::default())?;

    let written = if args.is_selective() {
        extract_selected(&mut session, args)?
    } else {
        let options = ExtractOptions {
            overwrite: !args.keep_existing,
            preserve_permissions: !args.no_preserve,
            preserve_times: !args.no_preserve,
            ..ExtractOptions::new(args.output)
        };
        session.extract_all(&options)?
    };
    session.close()?;

    if args.verbose {
        eprintln!("Extracted {written} entries to {}", args.output.display());
    }
    Ok(())
}

/// Extract the chosen entries one at a time. Only files and directories are
/// written; links need the whole archive and are skipped. Lookups are by
/// name, so when a name repeats only its first entry is extracted.
fn extract_selected(
    session: &mut ArchiveSession,
    args: &ExtractArgs,
) -> Result<usize, Box<dyn std::error::Error>> {
    let entries = session.entries()?;
    let mut seen = HashSet::new();
    let mut written = 0;

    for entry in entries.iter().filter(|e| args.selects(&e.name)) {
        if !seen.insert(entry.name.as_str()) {
            log::warn!("'{}' appears more than once; keeping the first", entry.name);
            continue;
        }
        if !is_safe_path(&entry.name) {
            return Err(OxiTarError::path_traversal(entry.name.as_str(), PathContext::Entry).into());
        }
        let target = args.output.join(&entry.name);

        match entry.kind() {
            EntryKind::Directory => fs::create_dir_all(&target)?,
            EntryKind::File | EntryKind::Unknown => {
                if args.keep_existing && target.exists() {
                    log::warn!("keeping existing {}", target.display());
                    continue;
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                session.extract_to(&entry.name, &target)?;
            }
            kind => {
                log::warn!("skipping {} entry '{}'", kind.as_str(), entry.name);
                continue;
            }
        }

        if args.verbose {
            eprintln!("  Extracted: {}", entry.name);
        }
        written += 1;
    }

    for name in args.files {
        if !entries.iter().any(|e| names_equal(&e.name, name)) {
            log::warn!("'{name}' not found in archive");
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxitar::AddOptions;

    fn archive(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("in.tar.zst");
        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Write, SessionOptions::default()).unwrap();
        let options = AddOptions::default();
        session.add_directory("docs", &options).unwrap();
        session.add("docs/a.md", b"a", &options).unwrap();
        session.add("docs/b.txt", b"b", &options).unwrap();
        session.add_symlink("docs/link", "a.md", &options).unwrap();
        session.close().unwrap();
        path
    }

    fn args<'a>(output: &'a Path, files: &'a [String], include: &'a [String]) -> ExtractArgs<'a> {
        ExtractArgs {
            output,
            files,
            include,
            exclude: &[],
            keep_existing: false,
            no_preserve: false,
            verbose: false,
        }
    }

    #[test]
    fn test_extract_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive(dir.path());
        let out = dir.path().join("out");
        let include = vec!["*.md".to_string()];

        cmd_extract(&path, &args(&out, &[], &include)).unwrap();
        assert_eq!(fs::read(out.join("docs/a.md")).unwrap(), b"a");
        assert!(!out.join("docs/b.txt").exists());
        assert!(!out.join("docs/link").exists());
    }

    #[test]
    fn test_extract_named_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive(dir.path());
        let out = dir.path().join("out");
        let files = vec!["docs/b.txt".to_string(), "missing".to_string()];

        cmd_extract(&path, &args(&out, &files, &[])).unwrap();
        assert_eq!(fs::read(out.join("docs/b.txt")).unwrap(), b"b");
        assert!(!out.join("docs/a.md").exists());
    }

    #[test]
    fn test_repeated_name_extracted_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.tar");
        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Write, SessionOptions::default()).unwrap();
        session.add("dup.txt", b"first", &AddOptions::default()).unwrap();
        session.add("dup.txt", b"second", &AddOptions::default()).unwrap();
        session.close().unwrap();

        let out = dir.path().join("out");
        let files = vec!["dup.txt".to_string()];
        let mut session =
            ArchiveSession::open_path(&path, SessionMode::Read, SessionOptions::default()).unwrap();
        let written = extract_selected(&mut session, &args(&out, &files, &[])).unwrap();
        assert_eq!(written, 1);
        assert_eq!(fs::read(out.join("dup.txt")).unwrap(), b"first");
    }

    #[test]
    fn test_extract_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive(dir.path());
        let out = dir.path().join("out");

        cmd_extract(&path, &args(&out, &[], &[])).unwrap();
        assert!(out.join("docs/a.md").exists());
        assert!(out.join("docs/b.txt").exists());
    }
}
