//! Error types for the crypto primitives.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by the crypto primitives.
///
/// All of these are precondition violations rather than transient
/// conditions; callers must fail fast and never retry them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A key has the wrong shape (not 32 bytes / 64 hex characters).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Ciphertext is malformed, for example too short to carry an IV.
    #[error("invalid ciphertext: {0}")]
    Format(String),
}

impl CryptoError {
    /// Creates an invalid-key error.
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        CryptoError::InvalidKey(msg.into())
    }

    /// Creates a ciphertext-format error.
    pub fn format(msg: impl Into<String>) -> Self {
        CryptoError::Format(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CryptoError::invalid_key("expected 64 hex characters");
        assert!(err.to_string().contains("64 hex"));

        let err = CryptoError::format("too short");
        assert!(err.to_string().contains("too short"));
    }
}
