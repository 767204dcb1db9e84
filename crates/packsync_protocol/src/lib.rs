//! # packsync protocol
//!
//! Wire types shared by the packsync client and server.
//!
//! This crate provides:
//! - `RemoteManifest` and `RemotePackDescriptor` (the `/manifest.json` schema)
//! - Key-exchange payloads (challenge request/response, exchange request/response)
//! - The ping payload
//! - Filename rules enforced on both sides (allowed extensions, traversal check)
//!
//! This is a pure protocol crate with no I/O operations. All types
//! round-trip through JSON with `serde`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod filename;
mod key_exchange;
mod manifest;
mod ping;

pub use error::{ProtocolError, ProtocolResult};
pub use filename::{allowed_extension, safe_filename, ALLOWED_EXTENSIONS};
pub use key_exchange::{
    ChallengeRequest, ChallengeResponse, ErrorResponse, ExchangeRequest, ExchangeResponse,
    CHALLENGE_PATH, EXCHANGE_PATH,
};
pub use manifest::{
    EncryptionInfo, PackKind, RemoteManifest, RemotePackDescriptor, ENCRYPTION_ALGORITHM,
    MANIFEST_PATH, MANIFEST_SCHEMA_VERSION,
};
pub use ping::{PingResponse, PING_PATH};
