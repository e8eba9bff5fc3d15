//! Utility functions for the CLI.

use glob::Pattern;
use oxitar::{EntryKind, EntryMetadata};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Check if a name matches the filter patterns.
/// - If include patterns are specified, the name must match at least one
/// - If exclude patterns are specified, the name must not match any
pub fn matches_filters(name: &str, include: &[String], exclude: &[String]) -> bool {
    let matches = |patterns: &[String]| {
        patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches(name))
    };

    if matches(exclude) {
        return false;
    }
    include.is_empty() || matches(include)
}

/// Keep the entries that pass the include/exclude patterns.
pub fn filter_entries(
    entries: Vec<EntryMetadata>,
    include: &[String],
    exclude: &[String],
) -> Vec<EntryMetadata> {
    if include.is_empty() && exclude.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|e| matches_filters(&e.name, include, exclude))
        .collect()
}

/// `ls -l` style type and permission string, e.g. `drwxr-xr-x`.
pub fn mode_string(entry: &EntryMetadata) -> String {
    let kind = match entry.kind() {
        EntryKind::Directory => 'd',
        EntryKind::Symlink => 'l',
        EntryKind::Hardlink => 'h',
        EntryKind::CharDevice => 'c',
        EntryKind::BlockDevice => 'b',
        EntryKind::Fifo => 'p',
        EntryKind::Socket => 's',
        EntryKind::File | EntryKind::Unknown => '-',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (entry.mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Format a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Seconds since the Unix epoch, if the entry has a modification time.
pub fn mtime_secs(entry: &EntryMetadata) -> Option<i64> {
    let modified = entry.modified?;
    Some(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    })
}

/// Archive name for `path`, relative to the parent of the root it was found under.
pub fn archive_name(path: &Path, root: &Path) -> String {
    let base = root.parent().unwrap_or(root);
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Print entries, one name per line or as a table.
pub fn print_entries(entries: &[EntryMetadata], verbose: bool) {
    if !verbose {
        for entry in entries {
            println!("{}", entry.name);
        }
        return;
    }

    println!("{:<10} {:>8} {:>8} {:>12} {:>12}  Name", "Mode", "Owner", "Group", "Size", "Modified");
    println!("{}", "-".repeat(72));

    let mut total_size = 0u64;
    for entry in entries {
        let owner = entry.uname.clone().unwrap_or_else(|| entry.uid.to_string());
        let group = entry.gname.clone().unwrap_or_else(|| entry.gid.to_string());
        let mtime = mtime_secs(entry).map_or_else(|| "-".to_string(), |t| t.to_string());
        let name = match entry.link_target() {
            Some(target) if entry.is_symlink() => format!("{} -> {}", entry.name, target),
            Some(target) => format!("{} link to {}", entry.name, target),
            None => entry.name.clone(),
        };
        println!(
            "{:<10} {:>8} {:>8} {:>12} {:>12}  {}",
            mode_string(entry),
            owner,
            group,
            entry.size,
            mtime,
            name
        );
        total_size += entry.size;
    }

    println!("{}", "-".repeat(72));
    println!("{} entries, {}", entries.len(), format_size(total_size));
}
