//! Archive entry metadata.
//!
//! This module defines [`EntryMetadata`], the format-agnostic description of
//! one item in a tar archive, and [`EntryKind`], its file type.

use std::time::SystemTime;

/// Entry type (file, directory, symlink, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    /// Regular file.
    #[default]
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Hard link.
    Hardlink,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Unix socket.
    Socket,
    /// Unknown type.
    Unknown,
}

impl EntryKind {
    /// Lowercase name used in listings and metadata dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Hardlink => "hardlink",
            Self::CharDevice => "chardev",
            Self::BlockDevice => "blockdev",
            Self::Fifo => "fifo",
            Self::Socket => "socket",
            Self::Unknown => "unknown",
        }
    }

    /// Check if this is a device node.
    pub fn is_device(&self) -> bool {
        matches!(self, Self::CharDevice | Self::BlockDevice)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a single archive entry.
///
/// `file_type` holds the raw type recorded in the header. The reported
/// type is [`EntryMetadata::kind`], which lets a hardlink target win over
/// whatever the raw type says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Archive-relative pathname.
    pub name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: Option<SystemTime>,
    /// Last access time.
    pub accessed: Option<SystemTime>,
    /// Creation (or status change) time.
    pub created: Option<SystemTime>,
    /// Permission bits.
    pub mode: u32,
    /// Owner user ID.
    pub uid: u64,
    /// Owner group ID.
    pub gid: u64,
    /// Owner user name.
    pub uname: Option<String>,
    /// Owner group name.
    pub gname: Option<String>,
    /// Raw file type.
    pub file_type: EntryKind,
    /// Symlink target.
    pub symlink_target: Option<String>,
    /// Hardlink target.
    pub hardlink_target: Option<String>,
    /// Device major number.
    pub devmajor: Option<u32>,
    /// Device minor number.
    pub devminor: Option<u32>,
    /// Raw tar type flag of an [`EntryKind::Unknown`] entry, kept so the
    /// entry can be copied into another archive unchanged.
    pub typeflag: Option<u8>,
}

impl EntryMetadata {
    /// Create a new regular file entry.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            modified: None,
            accessed: None,
            created: None,
            mode: 0o644,
            uid: 0,
            gid: 0,
            uname: None,
            gname: None,
            file_type: EntryKind::File,
            symlink_target: None,
            hardlink_target: None,
            devmajor: None,
            devminor: None,
            typeflag: None,
        }
    }

    /// Create a new directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            mode: 0o755,
            file_type: EntryKind::Directory,
            ..Self::file(name, 0)
        }
    }

    /// Create a new symlink entry.
    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            mode: 0o777,
            file_type: EntryKind::Symlink,
            symlink_target: Some(target.into()),
            ..Self::file(name, 0)
        }
    }

    /// Create a new hardlink entry.
    pub fn hardlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            file_type: EntryKind::Hardlink,
            hardlink_target: Some(target.into()),
            ..Self::file(name, 0)
        }
    }

    /// The reported entry type.
    pub fn kind(&self) -> EntryKind {
        match &self.hardlink_target {
            Some(target) if !target.is_empty() => EntryKind::Hardlink,
            _ => self.file_type,
        }
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    /// Check if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        self.kind() == EntryKind::Symlink
    }

    /// Check if this is a hardlink.
    pub fn is_hardlink(&self) -> bool {
        self.kind() == EntryKind::Hardlink
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind() == EntryKind::File
    }

    /// Link target: the symlink target if set, else the hardlink target.
    pub fn link_target(&self) -> Option<&str> {
        self.symlink_target
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.hardlink_target.as_deref().filter(|t| !t.is_empty()))
    }

    /// Device numbers, only reported for character and block devices.
    pub fn device_numbers(&self) -> Option<(u32, u32)> {
        if !self.kind().is_device() {
            return None;
        }
        Some((self.devmajor.unwrap_or(0), self.devminor.unwrap_or(0)))
    }

    /// Builder method to set modification time.
    pub fn with_modified(mut self, time: SystemTime) -> Self {
        self.modified = Some(time);
        self
    }

    /// Builder method to set permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method to set numeric ownership.
    pub fn with_owner(mut self, uid: u64, gid: u64) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self::file("", 0)
    }
}

impl std::fmt::Display for EntryMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let type_char = match self.kind() {
            EntryKind::Directory => 'd',
            EntryKind::Symlink => 'l',
            EntryKind::Hardlink => 'h',
            EntryKind::CharDevice => 'c',
            EntryKind::BlockDevice => 'b',
            EntryKind::Fifo => 'p',
            EntryKind::Socket => 's',
            _ => '-',
        };
        write!(f, "{}{:04o} {:>10} {}", type_char, self.mode & 0o7777, self.size, self.name)?;
        if let Some(target) = self.link_target() {
            write!(f, " -> {}", target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_file() {
        let entry = EntryMetadata::file("test.txt", 1000).with_mode(0o600);
        assert!(entry.is_file());
        assert!(!entry.is_directory());
        assert_eq!(entry.size, 1000);
        assert_eq!(entry.kind().as_str(), "file");
        assert_eq!(entry.link_target(), None);
    }

    #[test]
    fn test_hardlink_precedence() {
        let mut entry = EntryMetadata::file("copy.txt", 0);
        entry.hardlink_target = Some("orig.txt".to_string());
        assert_eq!(entry.file_type, EntryKind::File);
        assert_eq!(entry.kind(), EntryKind::Hardlink);
        assert!(entry.is_hardlink());
        assert_eq!(entry.link_target(), Some("orig.txt"));

        entry.hardlink_target = Some(String::new());
        assert_eq!(entry.kind(), EntryKind::File);
    }

    #[test]
    fn test_symlink_target_wins() {
        let mut entry = EntryMetadata::symlink("link", "target");
        entry.hardlink_target = Some("other".to_string());
        assert_eq!(entry.link_target(), Some("target"));
    }

    #[test]
    fn test_device_numbers() {
        let mut entry = EntryMetadata::file("dev/null", 0);
        entry.devmajor = Some(1);
        entry.devminor = Some(3);
        assert_eq!(entry.device_numbers(), None);

        entry.file_type = EntryKind::CharDevice;
        assert_eq!(entry.device_numbers(), Some((1, 3)));
    }

    #[test]
    fn test_display() {
        let entry = EntryMetadata::directory("subdir/");
        assert_eq!(entry.to_string(), format!("d0755 {:>10} subdir/", 0));
    }
}
