//! Info command implementation.

use crate::utils::format_size;
use oxitar::{ArchiveSession, EntryKind, EntryMetadata, SessionMode, SessionOptions};
use std::collections::BTreeMap;
use std::path::Path;

/// Entry counts and sizes for one archive.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    by_kind: BTreeMap<&'static str, usize>,
    total_size: u64,
    largest: Option<(String, u64)>,
}

impl Summary {
    fn collect(entries: &[EntryMetadata]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            *summary.by_kind.entry(entry.kind().as_str()).or_default() += 1;
            summary.total_size += entry.size;
            if entry.kind() == EntryKind::File
                && summary.largest.as_ref().is_none_or(|(_, size)| entry.size > *size)
            {
                summary.largest = Some((entry.name.clone(), entry.size));
            }
        }
        summary
    }
}

pub fn cmd_info(archive: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file_size = std::fs::metadata(archive)?.len();
    let mut session = ArchiveSession::open_path(archive, SessionMode::Read, SessionOptions::default())?;
    let compression = session.compression();
    let entries = session.entries()?;
    let summary = Summary::collect(&entries);

    println!("Archive Information");
    println!("===================");
    println!("File: {}", archive.display());
    println!("Compression: {}", compression);
    println!("MIME type: {}", compression.mime_type());
    println!("Size: {} ({} bytes)", format_size(file_size), file_size);

    println!();
    println!("Contents:");
    println!("  Entries: {}", entries.len());
    for (kind, count) in &summary.by_kind {
        println!("  {}: {}", kind, count);
    }
    println!("  Total size: {} bytes", summary.total_size);
    if summary.total_size > 0 {
        println!(
            "  Compression ratio: {:.1}%",
            (1.0 - file_size as f64 / summary.total_size as f64) * 100.0
        );
    }
    if let Some((name, size)) = &summary.largest {
        println!("  Largest file: {} ({})", name, format_size(*size));
    }
    Ok(())
}
