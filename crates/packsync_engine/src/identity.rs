//! Pack identity extraction.
//!
//! Planning matches local and remote packs by UUID when one is known.
//! How a UUID is read out of a pack file depends on the pack format, so
//! the engine takes it through a trait; hosts plug in a reader for their
//! format and tests use [`MemoryIdentityReader`].

use crate::error::EngineResult;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Identity read from a local pack file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackIdentity {
    /// Stable pack UUID, if the file declares one.
    pub uuid: Option<Uuid>,
    /// Pack version string, if the file declares one.
    pub version: Option<String>,
}

impl PackIdentity {
    /// Identity with a UUID and version.
    pub fn new(uuid: Uuid, version: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid),
            version: Some(version.into()),
        }
    }
}

/// Reads pack identity from files on disk.
///
/// Returns `Ok(None)` when the file carries no identity; errors are
/// reserved for unreadable files.
pub trait PackIdentityReader: Send + Sync {
    /// Reads the identity of the pack at `path`.
    fn read_identity(&self, path: &Path) -> EngineResult<Option<PackIdentity>>;
}

/// Reader that knows no identities. Planning falls back to filenames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdentityReader;

impl PackIdentityReader for NoIdentityReader {
    fn read_identity(&self, _path: &Path) -> EngineResult<Option<PackIdentity>> {
        Ok(None)
    }
}

/// In-memory reader keyed by filename, for tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityReader {
    identities: HashMap<String, PackIdentity>,
}

impl MemoryIdentityReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity for the given filename.
    pub fn insert(&mut self, filename: impl Into<String>, identity: PackIdentity) {
        self.identities.insert(filename.into(), identity);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, filename: impl Into<String>, identity: PackIdentity) -> Self {
        self.insert(filename, identity);
        self
    }
}

impl PackIdentityReader for MemoryIdentityReader {
    fn read_identity(&self, path: &Path) -> EngineResult<Option<PackIdentity>> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(self.identities.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reader_yields_nothing() {
        let reader = NoIdentityReader;
        let identity = reader.read_identity(Path::new("/packs/a.zip")).unwrap();
        assert!(identity.is_none());
    }

    #[test]
    fn memory_reader_matches_by_filename() {
        let uuid = Uuid::new_v4();
        let reader = MemoryIdentityReader::new().with("a.zip", PackIdentity::new(uuid, "1.0.0"));

        let identity = reader
            .read_identity(Path::new("/some/dir/a.zip"))
            .unwrap()
            .unwrap();
        assert_eq!(identity.uuid, Some(uuid));
        assert_eq!(identity.version.as_deref(), Some("1.0.0"));

        assert!(reader.read_identity(Path::new("/b.zip")).unwrap().is_none());
    }
}
