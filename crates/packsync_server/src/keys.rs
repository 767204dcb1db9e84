//! Persistent per-pack encryption keys.

use dashmap::DashMap;
use packsync_crypto::PackKey;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Manages one AES-256 key per pack file, persisted as a JSON map so the
/// served ciphertext stays stable across server restarts.
///
/// Loading tolerates a missing or corrupt key file by starting empty; save
/// failures are logged and the in-memory map stays authoritative for the
/// life of the process.
pub struct PackKeyManager {
    key_file: PathBuf,
    keys: DashMap<String, String>,
}

impl PackKeyManager {
    /// Creates a manager backed by the given key file, loading any
    /// previously persisted keys.
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        let manager = Self {
            key_file: key_file.into(),
            keys: DashMap::new(),
        };
        manager.load();
        manager
    }

    /// Returns the key for a pack, generating and persisting a fresh one on
    /// first use.
    pub fn get_or_create(&self, filename: &str) -> String {
        let mut created = false;
        let key = self
            .keys
            .entry(filename.to_string())
            .or_insert_with(|| {
                created = true;
                PackKey::generate().to_hex()
            })
            .clone();
        if created {
            info!("Generated new encryption key for {}", filename);
            self.save();
        }
        key
    }

    /// Replaces the key for a pack, invalidating any ciphertext produced
    /// under the old one.
    pub fn regenerate(&self, filename: &str) -> String {
        let key = PackKey::generate().to_hex();
        self.keys.insert(filename.to_string(), key.clone());
        info!("Regenerated encryption key for {}", filename);
        self.save();
        key
    }

    /// Snapshot of all managed keys.
    pub fn all_keys(&self) -> HashMap<String, String> {
        self.keys
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Number of managed keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no keys are managed yet.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Writes the key map to disk. Failures are logged, not fatal.
    pub fn save(&self) {
        // BTreeMap keeps the file diffable between saves.
        let snapshot: BTreeMap<String, String> = self
            .keys
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize key map: {}", e);
                return;
            }
        };
        if let Some(parent) = self.key_file.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create key file directory: {}", e);
                return;
            }
        }
        if let Err(e) = fs::write(&self.key_file, json) {
            error!("Failed to save key file {}: {}", self.key_file.display(), e);
        }
    }

    fn load(&self) {
        if !self.key_file.is_file() {
            debug!(
                "Key file not found, will create on first use: {}",
                self.key_file.display()
            );
            return;
        }
        let text = match fs::read_to_string(&self.key_file) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to read key file {}: {}", self.key_file.display(), e);
                return;
            }
        };
        match serde_json::from_str::<HashMap<String, String>>(&text) {
            Ok(loaded) => {
                for (filename, key) in loaded {
                    self.keys.insert(filename, key);
                }
                info!(
                    "Loaded {} encryption key(s) from {}",
                    self.keys.len(),
                    self.key_file.display()
                );
            }
            Err(e) => {
                error!(
                    "Corrupt key file {}, starting empty: {}",
                    self.key_file.display(),
                    e
                );
            }
        }
    }
}
