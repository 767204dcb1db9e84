//! Pack encryption keys.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the CFB-8 initialization vector in bytes.
pub const IV_SIZE: usize = 16;
/// Length of a key serialized as hex characters.
pub const KEY_HEX_LEN: usize = KEY_SIZE * 2;

/// AES-256 key for pack encryption.
///
/// The serialized form is exactly 64 hex characters; anything else fails
/// validation. The raw bytes are zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PackKey {
    bytes: [u8; KEY_SIZE],
}

impl PackKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::invalid_key(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Parses a key from its hex serialization.
    ///
    /// Upper and lower case are both accepted on input; [`to_hex`](Self::to_hex)
    /// always emits lowercase.
    ///
    /// # Errors
    ///
    /// Returns an error unless the string is exactly 64 hex characters.
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        if !Self::is_valid_hex(hex_str) {
            return Err(CryptoError::invalid_key(format!(
                "expected {KEY_HEX_LEN} hex characters, got {} characters",
                hex_str.len()
            )));
        }

        let decoded = hex::decode(hex_str).map_err(|e| CryptoError::invalid_key(e.to_string()))?;
        Self::from_bytes(&decoded)
    }

    /// Returns true if the string has the shape of a serialized key.
    #[must_use]
    pub fn is_valid_hex(hex_str: &str) -> bool {
        hex_str.len() == KEY_HEX_LEN && hex_str.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Serializes the key as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method - don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for PackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
