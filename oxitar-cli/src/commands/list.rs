//! List command implementation.

use crate::utils::{filter_entries, mtime_secs, print_entries};
use oxitar::{ArchiveSession, EntryMetadata, SessionMode, SessionOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JSON serializable entry data for archive listings.
#[derive(Debug, Serialize, Deserialize)]
struct EntryJson {
    name: String,
    size: u64,
    #[serde(rename = "type")]
    kind: String,
    mode: u32,
    uid: u64,
    gid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    uname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mtime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link_target: Option<String>,
    is_directory: bool,
    is_symlink: bool,
    is_hardlink: bool,
}

impl EntryJson {
    fn from_entry(entry: &EntryMetadata) -> Self {
        Self {
            name: entry.name.clone(),
            size: entry.size,
            kind: entry.kind().as_str().to_string(),
            mode: entry.mode,
            uid: entry.uid,
            gid: entry.gid,
            uname: entry.uname.clone(),
            gname: entry.gname.clone(),
            mtime: mtime_secs(entry),
            link_target: entry.link_target().map(str::to_string),
            is_directory: entry.is_directory(),
            is_symlink: entry.is_symlink(),
            is_hardlink: entry.is_hardlink(),
        }
    }
}

/// JSON output for archive listing.
#[derive(Debug, Serialize, Deserialize)]
struct ArchiveListJson {
    archive: String,
    compression: String,
    entries: Vec<EntryJson>,
}

/// Options for listing archive contents.
pub struct ListOptions<'a> {
    pub verbose: bool,
    pub json: bool,
    pub include: &'a [String],
    pub exclude: &'a [String],
}

pub fn cmd_list(archive: &Path, options: &ListOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = ArchiveSession::open_path(archive, SessionMode::Read, SessionOptions::default())?;
    let entries = filter_entries(session.entries()?, options.include, options.exclude);

    if options.json {
        let listing = ArchiveListJson {
            archive: archive.display().to_string(),
            compression: session.compression().to_string(),
            entries: entries.iter().map(EntryJson::from_entry).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if options.verbose {
        println!("Archive: {} ({})", archive.display(), session.compression());
        println!();
    }
    print_entries(&entries, options.verbose);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json_shape() {
        let entry = EntryMetadata::symlink("latest", "v1.txt");
        let value = serde_json::to_value(EntryJson::from_entry(&entry)).unwrap();
        assert_eq!(value["type"], "symlink");
        assert_eq!(value["link_target"], "v1.txt");
        assert_eq!(value["is_symlink"], true);
        assert!(value.get("uname").is_none());
    }
}
