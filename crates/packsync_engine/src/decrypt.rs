//! Decryption of downloaded ciphertext packs.
//!
//! Encrypted packs are stored on disk as served, still ciphertext. This
//! step fetches their keys over the challenge handshake and decrypts
//! each one into memory for the host's loading pipeline; plaintext is
//! never written back to disk.

use crate::config::SyncConfig;
use crate::error::EngineResult;
use crate::http::HttpClient;
use crate::key_client::KeyExchangeClient;
use packsync_protocol::RemoteManifest;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Decrypts every synced encrypted pack listed in `manifest`.
///
/// Returns filename to plaintext. A manifest without an enabled
/// encryption block yields an empty map. Key fetching is fatal on the
/// first failure; after that, per-pack read or decrypt problems are
/// logged and the pack is skipped.
pub fn decrypt_synced_packs<C: HttpClient>(
    config: &SyncConfig,
    client: Arc<C>,
    manifest: &RemoteManifest,
) -> EngineResult<HashMap<String, Vec<u8>>> {
    let Some(encryption) = &manifest.encryption else {
        return Ok(HashMap::new());
    };
    if !encryption.enabled {
        return Ok(HashMap::new());
    }

    let encrypted: Vec<_> = manifest.packs.iter().filter(|p| p.encrypted).collect();
    if encrypted.is_empty() {
        info!("No encrypted packs to decrypt");
        return Ok(HashMap::new());
    }

    let key_client = KeyExchangeClient::new(&config.server_url, &encryption.server_token, client);
    let filenames: Vec<String> = encrypted.iter().map(|p| p.name.clone()).collect();
    info!("Requesting decryption keys for {} packs", filenames.len());
    let keys = key_client.fetch_keys(&filenames)?;

    let synced_dir = config.synced_dir();
    let mut plaintexts = HashMap::new();

    for pack in &encrypted {
        let path = synced_dir.join(&pack.name);
        if !path.is_file() {
            warn!("Encrypted pack file not found: {}", pack.name);
            continue;
        }
        let Some(key) = keys.get(&pack.name) else {
            error!("No decryption key for {}", pack.name);
            continue;
        };

        let ciphertext = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read {}: {}", pack.name, e);
                continue;
            }
        };
        match packsync_crypto::decrypt(&ciphertext, key) {
            Ok(plaintext) => {
                info!("Decrypted {} ({} bytes)", pack.name, plaintext.len());
                plaintexts.insert(pack.name.clone(), plaintext);
            }
            Err(e) => error!("Failed to decrypt {}: {}", pack.name, e),
        }
    }

    info!(
        "Decryption complete: {}/{} packs",
        plaintexts.len(),
        encrypted.len()
    );
    Ok(plaintexts)
}
