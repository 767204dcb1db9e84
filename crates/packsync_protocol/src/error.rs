//! Error types for wire encoding and decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A payload was not valid JSON or did not match the schema.
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemoteManifest;

    #[test]
    fn decode_failure_maps_to_json_variant() {
        let err = RemoteManifest::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
        assert!(err.to_string().contains("invalid payload"));
    }
}
