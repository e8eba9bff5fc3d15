//! Path traversal checks applied before extraction touches the filesystem.

/// Check whether an archive path stays below the extraction root.
///
/// A path is unsafe when it is absolute (`/etc/passwd`), carries a drive
/// prefix (`C:\x`), or contains a `..` component. Both `/` and `\` count as
/// separators so archives produced on Windows are judged the same way. The
/// empty string is safe.
///
/// ```rust
/// use oxitar::is_safe_path;
///
/// assert!(is_safe_path("docs/readme.txt"));
/// assert!(is_safe_path("a..b/c"));
/// assert!(!is_safe_path("a/../../b"));
/// ```
pub fn is_safe_path(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }

    if path.starts_with('/') {
        return false;
    }

    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return false;
    }

    !path.split(['/', '\\']).any(|component| component == "..")
}
