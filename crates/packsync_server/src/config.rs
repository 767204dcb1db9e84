//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Sentinel value for [`ServerConfig::server_secret`] requesting an
/// auto-generated, persisted secret.
pub const AUTO_SERVER_SECRET: &str = "auto";

/// Name of the persisted filename-to-key map, stored in the pack directory.
pub const KEY_FILE_NAME: &str = ".keys.json";

/// Name of the persisted auto-generated server secret.
pub const SECRET_FILE_NAME: &str = ".server_secret";

/// Configuration for the pack server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory holding the pack files to serve.
    pub pack_dir: PathBuf,
    /// Whether packs are served encrypted, with the key exchange enabled.
    pub encryption_enabled: bool,
    /// Server secret feeding token and shared-secret derivation, or
    /// [`AUTO_SERVER_SECRET`] to generate and persist one.
    pub server_secret: String,
    /// Version string reported by the ping endpoint and the manifest.
    pub server_version: String,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr, pack_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            pack_dir: pack_dir.into(),
            encryption_enabled: false,
            server_secret: AUTO_SERVER_SECRET.to_string(),
            server_version: format!("packsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Enables or disables pack encryption.
    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption_enabled = enabled;
        self
    }

    /// Sets an explicit server secret instead of the auto-generated one.
    pub fn with_server_secret(mut self, secret: impl Into<String>) -> Self {
        self.server_secret = secret.into();
        self
    }

    /// Sets the advertised server version string.
    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    /// Path of the persisted key map.
    pub fn key_file(&self) -> PathBuf {
        self.pack_dir.join(KEY_FILE_NAME)
    }

    /// Path of the persisted auto-generated server secret.
    pub fn secret_file(&self) -> PathBuf {
        self.pack_dir.join(SECRET_FILE_NAME)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)), "packs")
    }
}
