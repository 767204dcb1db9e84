//! Server secret resolution.
//!
//! The secret is the root of the whole key-exchange trust chain: the
//! published server token and the shared secret clients prove knowledge of
//! are both derived from it. It never travels over the wire.

use crate::config::{ServerConfig, AUTO_SERVER_SECRET};
use crate::error::{ServerError, ServerResult};
use packsync_crypto::PackKey;
use std::fs;
use tracing::{debug, info};

/// Resolves the server secret from the configuration.
///
/// An explicit secret is used as-is. The [`AUTO_SERVER_SECRET`] sentinel
/// reads the persisted secret file from the pack directory, generating and
/// writing a fresh random secret on first run so restarts keep the same
/// token.
pub fn resolve_server_secret(config: &ServerConfig) -> ServerResult<String> {
    if config.server_secret != AUTO_SERVER_SECRET {
        let secret = config.server_secret.trim();
        if secret.is_empty() {
            return Err(ServerError::internal("configured server secret is empty"));
        }
        return Ok(secret.to_string());
    }

    let path = config.secret_file();
    if path.is_file() {
        let secret = fs::read_to_string(&path)?.trim().to_string();
        if secret.is_empty() {
            return Err(ServerError::internal(format!(
                "secret file {} is empty",
                path.display()
            )));
        }
        debug!("Loaded server secret from {}", path.display());
        return Ok(secret);
    }

    let secret = PackKey::generate().to_hex();
    fs::create_dir_all(&config.pack_dir)?;
    fs::write(&path, &secret)?;
    info!("Auto-generated server secret saved to {}", path.display());
    Ok(secret)
}
