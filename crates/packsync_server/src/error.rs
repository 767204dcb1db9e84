//! Error types for the pack server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use packsync_crypto::CryptoError;
use packsync_protocol::ErrorResponse;
use thiserror::Error;
use tracing::error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the pack server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed or suspicious request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Key-exchange authentication failed.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The request targets something the server refuses to serve.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Encryption or key handling failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Creates an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ServerError::InvalidRequest(message.into())
    }

    /// Creates a not-authorized error.
    pub fn not_authorized(message: impl Into<String>) -> Self {
        ServerError::NotAuthorized(message.into())
    }

    /// Creates a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        ServerError::Forbidden(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        ServerError::NotFound(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ServerError::Internal(message.into())
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::NotAuthorized(_)
                | ServerError::Forbidden(_)
                | ServerError::NotFound(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotAuthorized(_) | ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Crypto(_) | ServerError::Io(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 5xx detail stays in the log, never in the response body.
        let message = match &self {
            ServerError::InvalidRequest(m)
            | ServerError::NotAuthorized(m)
            | ServerError::Forbidden(m)
            | ServerError::NotFound(m) => m.clone(),
            other => {
                error!("Request failed: {}", other);
                "internal server error".to_string()
            }
        };
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, Json(ErrorResponse::new(reason, message))).into_response()
    }
}
