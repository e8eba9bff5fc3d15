//! Whole-archive extraction: layout, metadata, traversal refusal, conflicts.

use oxitar::{AddOptions, ArchiveSession, EntryMetadata, ErrorClass, ExtractOptions, SessionOptions};
use oxitar_archive::{TarFormat, TarWriter};
use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn stamp() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_500_000_000)
}

fn sample_archive() -> Vec<u8> {
    let options = AddOptions::default().with_modified(stamp());
    let mut session = ArchiveSession::new_in_memory(SessionOptions::default()).expect("create");
    session.add_directory("project", &options).expect("dir");
    session
        .add("project/main.rs", b"fn main() {}\n", &options.clone().with_mode(0o600))
        .expect("file");
    session
        .add("project/deep/notes.txt", b"notes", &options)
        .expect("file without dir entry");
    session
        .add_symlink("project/latest", "main.rs", &options)
        .expect("symlink");
    session
        .add_hardlink("project/copy.rs", "project/main.rs", &options)
        .expect("hardlink");
    session.to_data().expect("data")
}

/// Build an archive with names the session API would never produce.
fn raw_archive(entries: &[EntryMetadata]) -> Vec<u8> {
    let mut writer = TarWriter::new(Vec::new(), TarFormat::Pax);
    for meta in entries {
        let data = vec![b'x'; meta.size as usize];
        writer.write_header(meta).expect("header");
        writer.write_data(&data).expect("data");
    }
    writer.finish().expect("finish")
}

#[test]
fn test_extract_layout_and_metadata() {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("out");

    let mut session = ArchiveSession::from_bytes(sample_archive()).expect("open");
    let written = session
        .extract_all(&ExtractOptions::new(&dest))
        .expect("extract");
    // Symlinks are only created on unix
    assert_eq!(written, if cfg!(unix) { 5 } else { 4 });

    let main = dest.join("project/main.rs");
    assert_eq!(fs::read(&main).expect("main"), b"fn main() {}\n");
    assert_eq!(fs::read(dest.join("project/deep/notes.txt")).expect("notes"), b"notes");
    assert_eq!(fs::read(dest.join("project/copy.rs")).expect("copy"), b"fn main() {}\n");

    let mtime = fs::metadata(&main).expect("stat").modified().expect("mtime");
    assert_eq!(mtime, stamp());
    let dir_mtime = fs::metadata(dest.join("project")).expect("stat").modified().expect("mtime");
    assert_eq!(dir_mtime, stamp());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&main).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let link = dest.join("project/latest");
        assert_eq!(fs::read_link(&link).expect("readlink").to_str(), Some("main.rs"));
        assert_eq!(fs::read(&link).expect("follow"), b"fn main() {}\n");
    }
}

#[test]
fn test_traversal_aborts_and_keeps_earlier_entries() {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("out");

    let archive = raw_archive(&[
        EntryMetadata::file("ok.txt", 2),
        EntryMetadata::file("../escape.txt", 2),
        EntryMetadata::file("after.txt", 2),
    ]);
    let mut session = ArchiveSession::from_bytes(archive).expect("open");
    let err = session
        .extract_all(&ExtractOptions::new(&dest))
        .expect_err("traversal must fail");

    assert_eq!(err.class(), ErrorClass::SecurityPathTraversal);
    assert_eq!(
        err.to_string(),
        "refusing to extract entry with unsafe path: '../escape.txt' (potential path traversal attack)"
    );
    assert!(dest.join("ok.txt").exists());
    assert!(!dir.path().join("escape.txt").exists());
    assert!(!dest.join("after.txt").exists());
}

#[test]
fn test_unsafe_link_targets_are_refused() {
    let dir = tempfile::tempdir().expect("tempdir");

    let cases = [
        (EntryMetadata::symlink("link", "/etc/passwd"), "symlink target"),
        (EntryMetadata::symlink("link", "../../outside"), "symlink target"),
        (EntryMetadata::hardlink("hard", "C:\\Windows\\x"), "hardlink target"),
        (EntryMetadata::file("/abs", 0), "entry"),
    ];
    for (meta, context) in cases {
        let mut session = ArchiveSession::from_bytes(raw_archive(&[meta])).expect("open");
        let err = session
            .extract_all(&ExtractOptions::new(dir.path()))
            .expect_err("unsafe link");
        assert!(err.is_security());
        assert!(
            err.to_string().starts_with(&format!("refusing to extract {context} ")),
            "{err}"
        );
    }
    assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 0);
}

#[test]
fn test_overwrite_false_conflicts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = ArchiveSession::from_bytes(sample_archive()).expect("open");
    session
        .extract_all(&ExtractOptions::new(dir.path()))
        .expect("first extract");

    // Replacing is the default
    session
        .extract_all(&ExtractOptions::new(dir.path()))
        .expect("second extract");

    let keep = ExtractOptions {
        overwrite: false,
        ..ExtractOptions::new(dir.path())
    };
    let err = session.extract_all(&keep).expect_err("conflict");
    assert_eq!(err.class(), ErrorClass::IoFailure);
    assert!(err.to_string().contains("already exists"), "{err}");
}

#[test]
fn test_extract_without_metadata_preservation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = ExtractOptions {
        preserve_times: false,
        preserve_permissions: false,
        ..ExtractOptions::new(dir.path())
    };
    let mut session = ArchiveSession::from_bytes(sample_archive()).expect("open");
    session.extract_all(&options).expect("extract");

    let mtime = fs::metadata(dir.path().join("project/main.rs"))
        .expect("stat")
        .modified()
        .expect("mtime");
    assert_ne!(mtime, stamp());
}

#[test]
fn test_extract_requires_read_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = ArchiveSession::new_in_memory(SessionOptions::default()).expect("create");
    let err = session
        .extract_all(&ExtractOptions::new(dir.path()))
        .expect_err("write session");
    assert_eq!(err.class(), ErrorClass::InvalidState);
}
