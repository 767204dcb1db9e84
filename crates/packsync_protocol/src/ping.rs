//! Health-check payload.

use serde::{Deserialize, Serialize};

/// Route serving [`PingResponse`].
pub const PING_PATH: &str = "/ping";

/// Reply to `GET /ping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    /// Always `"ok"` from a healthy server.
    pub status: String,
    /// Server software version.
    pub version: String,
    /// Server clock, Unix millis.
    pub timestamp: u64,
}

impl PingResponse {
    /// Creates a healthy ping reply.
    pub fn ok(version: impl Into<String>, timestamp: u64) -> Self {
        Self {
            status: "ok".to_string(),
            version: version.into(),
            timestamp,
        }
    }
}
