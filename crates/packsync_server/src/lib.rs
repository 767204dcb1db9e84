//! # packsync server
//!
//! Embedded HTTP distribution server for packsync.
//!
//! This crate provides:
//! - An axum router serving the manifest, pack bytes, ping, and key exchange
//! - A one-time challenge store backing the key-exchange handshake
//! - A persistent per-pack key manager and an encrypted pack cache
//! - Server configuration and secret resolution
//!
//! # Architecture
//!
//! All handler state lives in one [`ServerContext`] built at startup and
//! shared through the router. The server keeps no per-client sessions;
//! apart from the persisted key map, its only state is three concurrent
//! maps (challenges, keys, ciphertext cache) that requests touch
//! independently per filename.
//!
//! With encryption disabled the server is a plain static file host for the
//! pack directory plus a manifest. Enabling encryption swaps the served
//! bytes for cached ciphertext and opens the challenge-response key
//! exchange.
//!
//! # Key Invariants
//!
//! - A challenge authorizes at most one exchange attempt, pass or fail
//! - Ciphertext is re-encrypted only when the source content hash changes
//! - Requested filenames never escape the flat pack directory
//! - The persisted key map survives restarts; a corrupt file starts empty

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod cache;
mod challenges;
mod clock;
mod config;
mod context;
mod error;
mod keys;
mod manifest;
mod routes;
mod secret;

pub use cache::{CachedPack, EncryptedPackCache};
pub use challenges::{ChallengeStore, CHALLENGE_TTL_MS, CLEANUP_INTERVAL_MS};
pub use config::{ServerConfig, AUTO_SERVER_SECRET, KEY_FILE_NAME, SECRET_FILE_NAME};
pub use context::{EncryptionState, ServerContext};
pub use error::{ServerError, ServerResult};
pub use keys::PackKeyManager;
pub use manifest::{DeclaredIdentity, ManifestBuilder};
pub use routes::{build_router, serve};
pub use secret::resolve_server_secret;
