//! Filename rules enforced on both sides of the wire.
//!
//! The server only ever serves files from a flat pack directory, so any
//! separator or parent reference in a requested name is an attack, not a
//! valid request. The extension allow-list is the closed set of bundle
//! formats the sync understands.

/// Extensions a pack file may carry, lowercase with the leading dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".zip", ".mcpack", ".mcaddon"];

/// Returns true if the filename ends in one of the allowed extensions.
///
/// Comparison is case-insensitive, matching filesystems that preserve but
/// do not distinguish case.
#[must_use]
pub fn allowed_extension(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Returns true if the filename is free of path-traversal characters.
///
/// Rejects anything containing `..`, `/` or `\`.
#[must_use]
pub fn safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_extensions() {
        assert!(allowed_extension("world.zip"));
        assert!(allowed_extension("textures.mcpack"));
        assert!(allowed_extension("bundle.mcaddon"));
        assert!(allowed_extension("SHOUTY.ZIP"));

        assert!(!allowed_extension("notes.txt"));
        assert!(!allowed_extension("archive.tar.gz"));
        assert!(!allowed_extension("zip"));
    }

    #[test]
    fn traversal_rejected() {
        assert!(safe_filename("world.zip"));
        assert!(safe_filename("pack-1.2.3.mcpack"));

        assert!(!safe_filename("../etc/passwd"));
        assert!(!safe_filename("a/b.zip"));
        assert!(!safe_filename("a\\b.zip"));
        assert!(!safe_filename("..\\secret.zip"));
        assert!(!safe_filename(""));
    }
}
