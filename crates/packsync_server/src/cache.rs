//! Encrypted pack cache.

use crate::clock;
use crate::error::ServerResult;
use crate::keys::PackKeyManager;
use dashmap::DashMap;
use packsync_crypto::{content_hash, content_hash_reader, encrypt, PackKey};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A cached ciphertext for one pack file.
pub struct CachedPack {
    /// Encrypted pack bytes, IV prepended.
    pub ciphertext: Vec<u8>,
    /// Content hash of the ciphertext, as advertised in the manifest.
    pub md5: String,
    /// Size of the ciphertext in bytes.
    pub size: u64,
    /// Content hash of the plaintext the ciphertext was produced from.
    pub source_md5: String,
    /// When the entry was cached, in epoch milliseconds.
    pub cached_at: u64,
}

/// Caches encrypted pack bytes so unchanged packs are not re-encrypted on
/// every request.
///
/// Freshness is keyed on the source plaintext hash: each lookup rehashes
/// the on-disk file and re-encrypts only on mismatch. Entries have no
/// expiry of their own; they live until the source changes or the entry is
/// invalidated explicitly.
pub struct EncryptedPackCache {
    keys: Arc<PackKeyManager>,
    entries: DashMap<String, Arc<CachedPack>>,
}

impl EncryptedPackCache {
    /// Creates a cache encrypting under keys from the given manager.
    pub fn new(keys: Arc<PackKeyManager>) -> Self {
        Self {
            keys,
            entries: DashMap::new(),
        }
    }

    /// Returns the ciphertext for a pack, re-encrypting if the source file
    /// changed since it was last cached.
    pub fn get_encrypted(&self, filename: &str, source: &Path) -> ServerResult<Arc<CachedPack>> {
        let mut file = File::open(source)?;
        let source_md5 = content_hash_reader(&mut file)?;
        drop(file);

        if let Some(entry) = self.entries.get(filename) {
            if entry.source_md5 == source_md5 {
                return Ok(Arc::clone(&entry));
            }
        }

        let key_hex = self.keys.get_or_create(filename);
        let key = PackKey::from_hex(&key_hex)?;
        let plaintext = fs::read(source)?;
        let ciphertext = encrypt(&plaintext, &key)?;
        let md5 = content_hash(&ciphertext);
        let size = ciphertext.len() as u64;
        info!(
            "Encrypted pack {} ({} -> {} bytes)",
            filename,
            plaintext.len(),
            size
        );

        let entry = Arc::new(CachedPack {
            ciphertext,
            md5,
            size,
            source_md5,
            cached_at: clock::now_ms(),
        });
        self.entries.insert(filename.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Drops the cached ciphertext for one pack.
    pub fn invalidate(&self, filename: &str) {
        if self.entries.remove(filename).is_some() {
            debug!("Cache invalidated for {}", filename);
        }
    }

    /// Drops all cached ciphertext.
    pub fn clear(&self) {
        self.entries.clear();
        info!("Encrypted pack cache cleared");
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
