//! Manifest assembly from the on-disk pack set.

use crate::cache::EncryptedPackCache;
use crate::clock;
use crate::error::ServerResult;
use packsync_crypto::content_hash_reader;
use packsync_protocol::{
    allowed_extension, EncryptionInfo, PackKind, RemoteManifest, RemotePackDescriptor,
};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Identity a host application declares for a pack file it serves.
#[derive(Debug, Clone)]
pub struct DeclaredIdentity {
    /// Stable pack identifier.
    pub uuid: Uuid,
    /// Semantic version of the pack content.
    pub version: String,
}

/// Builds a [`RemoteManifest`] from the files in a pack directory.
///
/// Only regular files with an allowed extension are listed; dotfiles and
/// anything else are ignored. With encryption enabled, the advertised
/// hash and size describe the ciphertext a client will actually download,
/// taken from the encrypted cache.
pub struct ManifestBuilder {
    pack_dir: PathBuf,
    server_version: Option<String>,
    identities: HashMap<String, DeclaredIdentity>,
    encryption: Option<(Arc<EncryptedPackCache>, String)>,
}

impl ManifestBuilder {
    /// Creates a builder over the given pack directory.
    pub fn new(pack_dir: impl Into<PathBuf>) -> Self {
        Self {
            pack_dir: pack_dir.into(),
            server_version: None,
            identities: HashMap::new(),
            encryption: None,
        }
    }

    /// Sets the server version to advertise.
    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = Some(version.into());
        self
    }

    /// Declares the identity of one pack file.
    pub fn with_identity(
        mut self,
        filename: impl Into<String>,
        uuid: Uuid,
        version: impl Into<String>,
    ) -> Self {
        self.identities.insert(
            filename.into(),
            DeclaredIdentity {
                uuid,
                version: version.into(),
            },
        );
        self
    }

    /// Serves ciphertext metadata from the given cache and embeds the
    /// encryption block carrying the server token.
    pub fn with_encryption(
        mut self,
        cache: Arc<EncryptedPackCache>,
        server_token: impl Into<String>,
    ) -> Self {
        self.encryption = Some((cache, server_token.into()));
        self
    }

    /// Assembles the manifest from the current directory contents.
    pub fn build(&self) -> ServerResult<RemoteManifest> {
        let files = self.list_pack_files()?;
        if files.is_empty() {
            warn!("No packs found in {}", self.pack_dir.display());
        }

        let encrypted = self.encryption.is_some();
        let mut packs = Vec::with_capacity(files.len());
        for (name, path) in files {
            let kind = if name.to_ascii_lowercase().ends_with(".mcaddon") {
                PackKind::Bundle
            } else {
                PackKind::Pack
            };

            let (md5, size) = match &self.encryption {
                Some((cache, _)) => {
                    let entry = cache.get_encrypted(&name, &path)?;
                    (entry.md5.clone(), entry.size)
                }
                None => {
                    let mut file = File::open(&path)?;
                    let md5 = content_hash_reader(&mut file)?;
                    (md5, fs::metadata(&path)?.len())
                }
            };

            let mut descriptor = RemotePackDescriptor::new(name.clone(), md5, size)
                .with_kind(kind)
                .with_encrypted(encrypted);
            if let Some(identity) = self.identities.get(&name) {
                descriptor = descriptor.with_identity(identity.uuid, identity.version.clone());
            }
            packs.push(descriptor);
        }

        let mut manifest = RemoteManifest::new(clock::now_ms(), packs);
        if let Some(version) = &self.server_version {
            manifest = manifest.with_server_version(version.clone());
        }
        if let Some((_, token)) = &self.encryption {
            manifest = manifest.with_encryption(EncryptionInfo::new(token.clone()));
        }

        info!(
            "Manifest generated: {} pack(s), {} bytes total{}",
            manifest.pack_count(),
            manifest.total_size(),
            if encrypted { " (encrypted)" } else { "" }
        );
        Ok(manifest)
    }

    fn list_pack_files(&self) -> ServerResult<Vec<(String, PathBuf)>> {
        let entries = match fs::read_dir(&self.pack_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || !allowed_extension(name) {
                continue;
            }
            files.push((name.to_string(), path));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}
