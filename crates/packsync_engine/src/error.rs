//! Error types for the sync engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Connection or timeout failure. During manifest checking this is
    /// surfaced to callers as the distinct "offline" outcome.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with an unexpected status or a malformed body.
    #[error("server error (status {status}): {message}")]
    Server {
        /// HTTP status code of the failing response.
        status: u16,
        /// What went wrong.
        message: String,
    },

    /// The sync configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A local filesystem operation failed.
    #[error("file error for {filename}: {message}")]
    File {
        /// The file involved.
        filename: String,
        /// What went wrong.
        message: String,
    },

    /// Downloaded bytes do not match the declared content hash.
    #[error("integrity check failed for {filename}: expected {expected}, got {actual}")]
    Integrity {
        /// The file involved.
        filename: String,
        /// Hash the manifest declared.
        expected: String,
        /// Hash the downloaded bytes produced.
        actual: String,
    },

    /// A crypto precondition was violated. Never retried.
    #[error("crypto error: {0}")]
    Crypto(#[from] packsync_crypto::CryptoError),

    /// The run was cancelled cooperatively.
    #[error("sync cancelled")]
    Cancelled,

    /// Anything that does not fit the categories above.
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl EngineError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        EngineError::Network(message.into())
    }

    /// Creates a server error for the given status.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        EngineError::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        EngineError::Config(message.into())
    }

    /// Creates a file error.
    pub fn file(filename: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::File {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Creates a catch-all error.
    pub fn unknown(message: impl Into<String>) -> Self {
        EngineError::Unknown(message.into())
    }

    /// True for connectivity failures that mean "proceed with local
    /// content", not "something is broken".
    pub fn is_offline(&self) -> bool {
        matches!(self, EngineError::Network(_))
    }

    /// True if a download attempt hitting this error may be retried.
    ///
    /// Cancellation, crypto precondition violations and configuration
    /// errors are never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            EngineError::Cancelled | EngineError::Crypto(_) | EngineError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_classification() {
        assert!(EngineError::network("connection refused").is_offline());
        assert!(!EngineError::server(500, "boom").is_offline());
        assert!(!EngineError::Cancelled.is_offline());
    }

    #[test]
    fn retry_classification() {
        assert!(EngineError::network("timed out").is_retryable());
        assert!(EngineError::server(404, "missing").is_retryable());
        assert!(EngineError::file("a.zip", "disk full").is_retryable());

        assert!(!EngineError::Cancelled.is_retryable());
        assert!(!EngineError::config("no server url").is_retryable());
        let crypto = EngineError::from(packsync_crypto::CryptoError::invalid_key("short"));
        assert!(!crypto.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = EngineError::Integrity {
            filename: "world.zip".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("world.zip"));
        assert!(msg.contains("aa"));
        assert!(msg.contains("bb"));
    }
}
