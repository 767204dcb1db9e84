//! Key-exchange payloads.
//!
//! Two round trips per pack: the client asks for a challenge, then proves
//! possession of the shared secret to obtain that pack's decryption key.

use serde::{Deserialize, Serialize};

/// Route minting challenges.
pub const CHALLENGE_PATH: &str = "/keys/challenge";

/// Route exchanging a proof for a pack key.
pub const EXCHANGE_PATH: &str = "/keys/exchange";

/// Client request for a fresh challenge (`POST /keys/challenge`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// Opaque id for logging and correlation, not authenticated.
    pub client_id: String,
}

impl ChallengeRequest {
    /// Creates a challenge request.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

/// Server reply carrying a one-time challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Random one-time value, 32 hex characters.
    pub challenge: String,
    /// When the challenge stops being accepted, Unix millis.
    pub expires_at: u64,
}

impl ChallengeResponse {
    /// Creates a challenge response.
    pub fn new(challenge: impl Into<String>, expires_at: u64) -> Self {
        Self {
            challenge: challenge.into(),
            expires_at,
        }
    }
}

/// Client proof submission (`POST /keys/exchange`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// The challenge being answered.
    pub challenge: String,
    /// Pack filename the key is requested for.
    pub filename: String,
    /// HMAC proof over `challenge + "|" + filename`.
    pub hmac: String,
}

impl ExchangeRequest {
    /// Creates an exchange request.
    pub fn new(
        challenge: impl Into<String>,
        filename: impl Into<String>,
        hmac: impl Into<String>,
    ) -> Self {
        Self {
            challenge: challenge.into(),
            filename: filename.into(),
            hmac: hmac.into(),
        }
    }
}

/// Successful exchange reply carrying the per-pack key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    /// The pack key, 64 hex characters.
    pub key: String,
}

impl ExchangeResponse {
    /// Creates an exchange response.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error payload returned with non-200 statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short reason, matching the HTTP status text.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

impl ErrorResponse {
    /// Creates an error payload.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
