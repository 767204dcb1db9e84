//! Local pack inventory.
//!
//! Walks the pack directory and its `synced/` subdirectory, hashing each
//! pack file and reading its identity. Manually installed packs live in
//! the root; everything under `synced/` is owned by the sync engine.

use crate::config::SyncConfig;
use crate::downloader::{BACKUP_SUFFIX, TEMP_SUFFIX};
use crate::error::EngineResult;
use crate::identity::PackIdentityReader;
use packsync_crypto::content_hash_reader;
use packsync_protocol::allowed_extension;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

/// Where a local pack was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Installed by the user in the pack root. Never touched by sync.
    Manual,
    /// Installed by the engine under `synced/`.
    Synced,
}

impl SourceKind {
    /// True for manually installed packs.
    pub fn is_manual(self) -> bool {
        matches!(self, SourceKind::Manual)
    }
}

/// One local pack file, hashed and identified.
#[derive(Debug, Clone)]
pub struct LocalPackRecord {
    /// File name without directory.
    pub filename: String,
    /// UUID read from the pack, when the reader found one.
    pub uuid: Option<Uuid>,
    /// Version read from the pack, when the reader found one.
    pub version: Option<String>,
    /// Lowercase hex MD5 of the file contents.
    pub content_hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Whether the pack is manual or synced.
    pub source: SourceKind,
}

impl LocalPackRecord {
    /// True for manually installed packs.
    pub fn is_manual(&self) -> bool {
        self.source.is_manual()
    }
}

/// Scans the configured pack directories.
#[derive(Debug)]
pub struct PackScanner<'a, R: PackIdentityReader> {
    config: &'a SyncConfig,
    identity_reader: &'a R,
}

impl<'a, R: PackIdentityReader> PackScanner<'a, R> {
    /// Creates a scanner over the directories in `config`.
    pub fn new(config: &'a SyncConfig, identity_reader: &'a R) -> Self {
        Self {
            config,
            identity_reader,
        }
    }

    /// Scans manual and synced packs, sorted by filename.
    ///
    /// Unreadable individual files are logged and skipped so one broken
    /// pack cannot block a sync. The `synced/` directory is created if
    /// it does not exist yet.
    pub fn scan(&self) -> EngineResult<Vec<LocalPackRecord>> {
        let mut records = Vec::new();

        let manual_dir = self.config.manual_dir();
        if manual_dir.is_dir() {
            self.scan_dir(&manual_dir, SourceKind::Manual, &mut records)?;
        }

        let synced_dir = self.config.synced_dir();
        if !synced_dir.is_dir() {
            fs::create_dir_all(&synced_dir)
                .map_err(|e| crate::error::EngineError::file("synced", e.to_string()))?;
        }
        self.scan_dir(&synced_dir, SourceKind::Synced, &mut records)?;

        records.sort_by(|a, b| a.filename.cmp(&b.filename));
        debug!("Scanned {} local packs", records.len());
        Ok(records)
    }

    fn scan_dir(
        &self,
        dir: &Path,
        source: SourceKind,
        records: &mut Vec<LocalPackRecord>,
    ) -> EngineResult<()> {
        let entries = fs::read_dir(dir)
            .map_err(|e| crate::error::EngineError::file(dir.display().to_string(), e.to_string()))?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry in {:?}: {}", dir, e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(String::from)
            else {
                continue;
            };
            if !is_pack_file(&filename) {
                continue;
            }

            match self.read_record(&path, &filename, source) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping unreadable pack {:?}: {}", path, e);
                }
            }
        }
        Ok(())
    }

    fn read_record(
        &self,
        path: &Path,
        filename: &str,
        source: SourceKind,
    ) -> EngineResult<LocalPackRecord> {
        let metadata = fs::metadata(path)
            .map_err(|e| crate::error::EngineError::file(filename, e.to_string()))?;
        let mut file = fs::File::open(path)
            .map_err(|e| crate::error::EngineError::file(filename, e.to_string()))?;
        let content_hash = content_hash_reader(&mut file)
            .map_err(|e| crate::error::EngineError::file(filename, e.to_string()))?;

        let identity = self.identity_reader.read_identity(path)?.unwrap_or_default();

        Ok(LocalPackRecord {
            filename: filename.to_string(),
            uuid: identity.uuid,
            version: identity.version,
            content_hash,
            size_bytes: metadata.len(),
            source,
        })
    }
}

/// True for files the scanner treats as packs.
///
/// Dotfiles and in-flight download artifacts are skipped along with any
/// extension the protocol does not allow.
fn is_pack_file(filename: &str) -> bool {
    if filename.starts_with('.') {
        return false;
    }
    if filename.ends_with(TEMP_SUFFIX) || filename.ends_with(BACKUP_SUFFIX) {
        return false;
    }
    allowed_extension(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryIdentityReader, NoIdentityReader, PackIdentity};

    fn write_pack(dir: &Path, name: &str, contents: &[u8]) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn scans_manual_and_synced_packs() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SyncConfig::new(tmp.path());
        fs::create_dir_all(config.synced_dir()).unwrap();

        write_pack(&config.manual_dir(), "manual.zip", b"manual contents");
        write_pack(&config.synced_dir(), "synced.mcpack", b"synced contents");

        let reader = NoIdentityReader;
        let records = PackScanner::new(&config, &reader).scan().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "manual.zip");
        assert_eq!(records[0].source, SourceKind::Manual);
        assert_eq!(records[1].filename, "synced.mcpack");
        assert_eq!(records[1].source, SourceKind::Synced);
        assert_eq!(records[0].content_hash, packsync_crypto::content_hash(b"manual contents"));
        assert_eq!(records[0].size_bytes, b"manual contents".len() as u64);
    }

    #[test]
    fn ignores_artifacts_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SyncConfig::new(tmp.path());

        write_pack(&config.manual_dir(), "keep.zip", b"x");
        write_pack(&config.manual_dir(), ".hidden.zip", b"x");
        write_pack(&config.manual_dir(), "partial.zip.downloading", b"x");
        write_pack(&config.manual_dir(), "old.zip.backup", b"x");
        write_pack(&config.manual_dir(), "readme.txt", b"x");

        let reader = NoIdentityReader;
        let records = PackScanner::new(&config, &reader).scan().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "keep.zip");
    }

    #[test]
    fn creates_missing_synced_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SyncConfig::new(tmp.path());
        assert!(!config.synced_dir().exists());

        let reader = NoIdentityReader;
        PackScanner::new(&config, &reader).scan().unwrap();
        assert!(config.synced_dir().is_dir());
    }

    #[test]
    fn attaches_identity_from_reader() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SyncConfig::new(tmp.path());
        write_pack(&config.manual_dir(), "known.zip", b"data");

        let uuid = Uuid::new_v4();
        let reader = MemoryIdentityReader::new().with("known.zip", PackIdentity::new(uuid, "2.1.0"));
        let records = PackScanner::new(&config, &reader).scan().unwrap();

        assert_eq!(records[0].uuid, Some(uuid));
        assert_eq!(records[0].version.as_deref(), Some("2.1.0"));
    }
}
