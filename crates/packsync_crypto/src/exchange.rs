//! Challenge and shared-secret primitives for the key exchange.
//!
//! The server publishes a token derived one-way from its secret. Client
//! and server independently combine that token with a module secret that
//! ships only inside client distribution artifacts, yielding the shared
//! secret that authenticates key-exchange requests. An observer who holds
//! only the public token cannot reproduce the shared secret without first
//! extracting the module secret from a client binary.
//!
//! ## Security Model
//!
//! This raises the attack cost from wire-sniffing to binary extraction,
//! nothing more. It is an obfuscation control, not a cryptographic
//! guarantee, and must be treated as such in any threat assessment.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a challenge (32 hex characters).
pub const CHALLENGE_SIZE: usize = 16;

const TOKEN_SALT: &[u8] = b"packsync::token::v1";
const DERIVE_SALT: &[u8] = b"packsync::secret::v1";

// Module secret, stored as two masked halves and reassembled on use so the
// literal never appears in a naive strings dump of the binary.
const SECRET_PART_A: [u8; 16] = [
    0x2a, 0x3b, 0x39, 0x31, 0x77, 0x29, 0x23, 0x34, 0x39, 0x77, 0x37, 0x35, 0x3e, 0x2f, 0x36,
    0x3f,
];
const SECRET_PART_B: [u8; 16] = [
    0x3f, 0x37, 0x38, 0x3f, 0x3e, 0x3e, 0x3f, 0x3e, 0x77, 0x29, 0x3f, 0x39, 0x28, 0x3f, 0x2e,
    0x6b,
];
const SECRET_MASK: u8 = 0x5a;

fn module_secret() -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, b) in SECRET_PART_A.iter().enumerate() {
        out[i] = *b ^ SECRET_MASK;
    }
    for (i, b) in SECRET_PART_B.iter().enumerate() {
        out[16 + i] = *b ^ SECRET_MASK;
    }
    out
}

fn hmac_sha256(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC can take key of any size")
}

/// Generates a fresh random challenge as 32 lowercase hex characters.
#[must_use]
pub fn generate_challenge() -> String {
    let mut bytes = [0u8; CHALLENGE_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Computes the proof a client submits for one pack.
///
/// The tag is HMAC-SHA256 over `challenge + "|" + filename`, keyed by the
/// shared secret, hex-encoded lowercase.
#[must_use]
pub fn challenge_proof(shared_secret: &str, challenge: &str, filename: &str) -> String {
    let mut mac = hmac_sha256(shared_secret.as_bytes());
    mac.update(challenge.as_bytes());
    mac.update(b"|");
    mac.update(filename.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a submitted proof in constant time.
///
/// The hex tag is accepted in either case. Returns false for anything
/// that is not a well-formed tag of the right length.
#[must_use]
pub fn verify_proof(shared_secret: &str, challenge: &str, filename: &str, proof: &str) -> bool {
    let Ok(submitted) = hex::decode(proof.to_ascii_lowercase()) else {
        return false;
    };

    let mut mac = hmac_sha256(shared_secret.as_bytes());
    mac.update(challenge.as_bytes());
    mac.update(b"|");
    mac.update(filename.as_bytes());
    mac.verify_slice(&submitted).is_ok()
}

/// Derives the public server token from the server secret.
///
/// One-way: SHA-256 over the secret and a fixed salt, hex-encoded. The
/// published token does not reveal the secret it came from.
#[must_use]
pub fn server_token(server_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_secret.as_bytes());
    hasher.update(TOKEN_SALT);
    hex::encode(hasher.finalize())
}

/// Derives the shared key-exchange secret from a published server token.
///
/// Deterministic in the token: HMAC the token under the module secret, mix
/// the tag with the token bytes repeated, hash with a fixed salt, then a
/// second HMAC keyed by that digest over (module secret || first tag).
#[must_use]
pub fn derive_shared_secret(token: &str) -> String {
    let secret = module_secret();

    let mut mac = hmac_sha256(&secret);
    mac.update(token.as_bytes());
    let first: [u8; 32] = mac.finalize().into_bytes().into();

    let token_bytes = token.as_bytes();
    let mut mixed = first;
    if !token_bytes.is_empty() {
        for (i, byte) in mixed.iter_mut().enumerate() {
            *byte ^= token_bytes[i % token_bytes.len()];
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(mixed);
    hasher.update(DERIVE_SALT);
    let digest = hasher.finalize();

    let mut second = hmac_sha256(&digest);
    second.update(&secret);
    second.update(&first);
    hex::encode(second.finalize().into_bytes())
}

/// Derives the shared secret directly from the server secret.
///
/// Convenience for the server side: token first, then the same derivation
/// a client performs from the published token.
#[must_use]
pub fn derive_shared_secret_from_server_secret(server_secret: &str) -> String {
    derive_shared_secret(&server_token(server_secret))
}
