//! # packsync crypto
//!
//! Crypto primitives for the packsync workspace.
//!
//! This crate provides:
//! - Content hashing (MD5, lowercase hex) for change detection and
//!   transfer integrity
//! - Pack encryption with AES-256 in CFB-8 mode (stream-like, no padding,
//!   IV prepended to the ciphertext)
//! - Validated 64-hex-character pack keys, zeroized on drop
//! - Challenge generation and HMAC-SHA256 proofs for the key exchange
//! - Server-token generation and shared-secret derivation
//!
//! ## Security Model
//!
//! - The content hash is a change-detection and integrity check, not a
//!   security primitive
//! - CFB-8 provides confidentiality only; tampering is caught by the
//!   separate content-hash verification, not by the cipher
//! - The shared-secret derivation mixes a secret embedded in client
//!   distribution artifacts with the published server token. It raises the
//!   bar from wire-sniffing to binary extraction and is documented as an
//!   obfuscation control, not a cryptographic guarantee

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod error;
mod exchange;
mod hash;
mod key;

pub use cipher::{decrypt, encrypt};
pub use error::{CryptoError, CryptoResult};
pub use exchange::{
    challenge_proof, derive_shared_secret, derive_shared_secret_from_server_secret,
    generate_challenge, server_token, verify_proof, CHALLENGE_SIZE,
};
pub use hash::{content_hash, content_hash_reader, hashes_match};
pub use key::{PackKey, IV_SIZE, KEY_HEX_LEN, KEY_SIZE};
