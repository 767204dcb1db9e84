//! Shared per-process server state.

use crate::cache::EncryptedPackCache;
use crate::challenges::ChallengeStore;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::keys::PackKeyManager;
use crate::manifest::{DeclaredIdentity, ManifestBuilder};
use crate::secret::resolve_server_secret;
use packsync_crypto::{derive_shared_secret_from_server_secret, server_token};
use packsync_protocol::RemoteManifest;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Everything the encrypted-serving path needs, built once at startup.
pub struct EncryptionState {
    /// Publicly served token derived from the server secret.
    pub server_token: String,
    /// Outstanding key-exchange challenges.
    pub challenges: ChallengeStore,
    /// Persistent per-pack keys.
    pub keys: Arc<PackKeyManager>,
    /// Cached ciphertext per pack.
    pub cache: Arc<EncryptedPackCache>,
}

/// State shared by all request handlers.
///
/// Constructed once per server process and passed to the router as
/// `Arc<ServerContext>`. With encryption enabled, construction resolves
/// the server secret and wires the challenge store, key manager, and
/// ciphertext cache; otherwise packs are served as plain files.
pub struct ServerContext {
    config: ServerConfig,
    identities: HashMap<String, DeclaredIdentity>,
    encryption: Option<EncryptionState>,
}

impl ServerContext {
    /// Builds the shared state from a configuration.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let encryption = if config.encryption_enabled {
            let secret = resolve_server_secret(&config)?;
            let token = server_token(&secret);
            let shared_secret = derive_shared_secret_from_server_secret(&secret);
            let keys = Arc::new(PackKeyManager::new(config.key_file()));
            let cache = Arc::new(EncryptedPackCache::new(Arc::clone(&keys)));
            info!("Encryption enabled (server token {}...)", prefix(&token, 16));
            Some(EncryptionState {
                server_token: token,
                challenges: ChallengeStore::new(shared_secret),
                keys,
                cache,
            })
        } else {
            None
        };

        Ok(Self {
            config,
            identities: HashMap::new(),
            encryption,
        })
    }

    /// Declares the identity of a served pack file, carried into the
    /// manifest so clients can match local copies by UUID.
    pub fn with_pack_identity(
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

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Encryption state, present only when encryption is enabled.
    pub fn encryption(&self) -> Option<&EncryptionState> {
        self.encryption.as_ref()
    }

    /// Builds a fresh manifest from the current pack directory contents.
    pub fn build_manifest(&self) -> ServerResult<RemoteManifest> {
        let mut builder = ManifestBuilder::new(&self.config.pack_dir)
            .with_server_version(self.config.server_version.clone());
        for (filename, identity) in &self.identities {
            builder = builder.with_identity(filename.clone(), identity.uuid, identity.version.clone());
        }
        if let Some(encryption) = &self.encryption {
            builder = builder
                .with_encryption(Arc::clone(&encryption.cache), encryption.server_token.clone());
        }
        builder.build()
    }
}

/// Truncates log output without risking a slice past the end.
fn prefix(text: &str, len: usize) -> &str {
    &text[..text.len().min(len)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use packsync_crypto::derive_shared_secret;
    use std::net::SocketAddr;

    fn config(dir: &std::path::Path) -> ServerConfig {
        ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)), dir)
    }

    #[test]
    fn plain_context_has_no_encryption_state() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ServerContext::new(config(dir.path())).unwrap();
        assert!(ctx.encryption().is_none());
        assert!(!ctx.config().encryption_enabled);
    }

    #[test]
    fn encrypted_context_derives_a_consistent_token() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ServerContext::new(
            config(dir.path())
                .with_encryption(true)
                .with_server_secret("fixed-secret"),
        )
        .unwrap();

        let encryption = ctx.encryption().unwrap();
        assert_eq!(encryption.server_token, server_token("fixed-secret"));
        // The challenge store verifies against the secret clients derive
        // from the published token.
        let shared = derive_shared_secret(&encryption.server_token);
        let (challenge, _) = encryption.challenges.create_challenge("test");
        let proof = packsync_crypto::challenge_proof(&shared, &challenge, "a.zip");
        assert!(encryption.challenges.verify_and_consume(&challenge, "a.zip", &proof));
    }

    #[test]
    fn manifest_carries_declared_identities_and_encryption() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("world.zip"), b"bytes").unwrap();
        let uuid = Uuid::new_v4();

        let ctx = ServerContext::new(
            config(dir.path())
                .with_encryption(true)
                .with_server_secret("fixed-secret"),
        )
        .unwrap()
        .with_pack_identity("world.zip", uuid, "2.0.0");

        let manifest = ctx.build_manifest().unwrap();
        assert!(manifest.is_encrypted());
        assert_eq!(manifest.packs[0].uuid, Some(uuid));
        assert_eq!(manifest.packs[0].version.as_deref(), Some("2.0.0"));
    }
}
