//! Client side of the challenge-response key exchange.
//!
//! The shared secret is derived once from the server token published in
//! the manifest; each pack key then costs one challenge round trip plus
//! one proof submission. Any failure is fatal for that pack's key. There
//! is no fallback to an unencrypted copy.

use crate::error::{EngineError, EngineResult};
use crate::http::{join_url, HttpClient};
use packsync_crypto::{challenge_proof, derive_shared_secret, generate_challenge, PackKey};
use packsync_protocol::{
    ChallengeRequest, ChallengeResponse, ExchangeRequest, ExchangeResponse, CHALLENGE_PATH,
    EXCHANGE_PATH,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Fetches per-pack decryption keys over the two-step handshake.
pub struct KeyExchangeClient<C: HttpClient> {
    base_url: String,
    client: Arc<C>,
    shared_secret: String,
}

impl<C: HttpClient> KeyExchangeClient<C> {
    /// Creates a client, deriving the shared secret from `server_token`.
    pub fn new(server_url: &str, server_token: &str, client: Arc<C>) -> Self {
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            client,
            shared_secret: derive_shared_secret(server_token),
        }
    }

    /// Fetches the decryption key for one pack.
    pub fn fetch_key(&self, filename: &str) -> EngineResult<PackKey> {
        debug!("Fetching key for {}", filename);
        let challenge = self.request_challenge()?;
        let proof = challenge_proof(&self.shared_secret, &challenge, filename);
        self.exchange(&challenge, filename, &proof)
    }

    /// Fetches keys for several packs, one handshake per filename.
    ///
    /// Serial on purpose; the first failure aborts the whole batch since
    /// a partial key set cannot decrypt the batch anyway.
    pub fn fetch_keys(&self, filenames: &[String]) -> EngineResult<HashMap<String, PackKey>> {
        let mut keys = HashMap::new();
        for filename in filenames {
            match self.fetch_key(filename) {
                Ok(key) => {
                    info!("Key obtained for {}", filename);
                    keys.insert(filename.clone(), key);
                }
                Err(e) => {
                    error!("Failed to fetch key for {}: {}", filename, e);
                    return Err(e);
                }
            }
        }
        Ok(keys)
    }

    fn request_challenge(&self) -> EngineResult<String> {
        let url = join_url(&self.base_url, CHALLENGE_PATH);
        let request = ChallengeRequest::new(generate_challenge());
        let body = serde_json::to_vec(&request)
            .map_err(|e| EngineError::unknown(format!("encoding challenge request: {e}")))?;

        let response = self.client.post_json(&url, &body)?;
        if !response.is_ok() {
            return Err(EngineError::server(
                response.status,
                format!("challenge request failed: HTTP {}", response.status),
            ));
        }

        let parsed: ChallengeResponse = serde_json::from_slice(&response.body).map_err(|_| {
            EngineError::server(200, "invalid challenge response: missing 'challenge' field")
        })?;
        debug!("Challenge obtained: {}...", prefix(&parsed.challenge, 8));
        Ok(parsed.challenge)
    }

    fn exchange(&self, challenge: &str, filename: &str, proof: &str) -> EngineResult<PackKey> {
        let url = join_url(&self.base_url, EXCHANGE_PATH);
        let request = ExchangeRequest::new(challenge, filename, proof);
        let body = serde_json::to_vec(&request)
            .map_err(|e| EngineError::unknown(format!("encoding exchange request: {e}")))?;

        let response = self.client.post_json(&url, &body)?;
        match response.status {
            200 => {
                let parsed: ExchangeResponse =
                    serde_json::from_slice(&response.body).map_err(|_| {
                        EngineError::server(200, "invalid exchange response: missing 'key' field")
                    })?;
                let key = PackKey::from_hex(&parsed.key)?;
                debug!("Key exchanged for {}", filename);
                Ok(key)
            }
            403 => Err(EngineError::server(
                403,
                format!("key exchange authentication failed for {filename}"),
            )),
            status => Err(EngineError::server(
                status,
                format!("key exchange failed: HTTP {status}"),
            )),
        }
    }
}

fn prefix(text: &str, len: usize) -> &str {
    &text[..text.len().min(len)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};
    use packsync_crypto::{server_token, verify_proof};

    fn client_with(mock: Arc<MockHttpClient>) -> KeyExchangeClient<MockHttpClient> {
        KeyExchangeClient::new("http://host:8080/", &server_token("secret"), mock)
    }

    fn queue_challenge(mock: &MockHttpClient, challenge: &str) {
        let response = ChallengeResponse::new(challenge, 2_000);
        mock.enqueue(
            CHALLENGE_PATH,
            HttpResponse::ok(serde_json::to_vec(&response).unwrap()),
        );
    }

    #[test]
    fn handshake_produces_key() {
        let mock = Arc::new(MockHttpClient::new());
        queue_challenge(&mock, "aabbccdd");
        let key = PackKey::generate();
        mock.enqueue(
            EXCHANGE_PATH,
            HttpResponse::ok(
                serde_json::to_vec(&ExchangeResponse::new(key.to_hex())).unwrap(),
            ),
        );

        let fetched = client_with(mock.clone()).fetch_key("world.zip").unwrap();
        assert_eq!(fetched.to_hex(), key.to_hex());

        // The submitted proof must verify under the derived shared secret
        let requests = mock.requests();
        let exchange: ExchangeRequest =
            serde_json::from_slice(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(exchange.challenge, "aabbccdd");
        assert_eq!(exchange.filename, "world.zip");
        let secret = packsync_crypto::derive_shared_secret(&server_token("secret"));
        assert!(verify_proof(&secret, "aabbccdd", "world.zip", &exchange.hmac));
    }

    #[test]
    fn rejection_is_fatal() {
        let mock = Arc::new(MockHttpClient::new());
        queue_challenge(&mock, "aabbccdd");
        mock.enqueue(EXCHANGE_PATH, HttpResponse::new(403, b"{}".to_vec()));

        let err = client_with(mock).fetch_key("world.zip").unwrap_err();
        assert!(matches!(err, EngineError::Server { status: 403, .. }));
    }

    #[test]
    fn malformed_key_fails_validation() {
        let mock = Arc::new(MockHttpClient::new());
        queue_challenge(&mock, "aabbccdd");
        mock.enqueue(
            EXCHANGE_PATH,
            HttpResponse::ok(
                serde_json::to_vec(&ExchangeResponse::new("too-short")).unwrap(),
            ),
        );

        let err = client_with(mock).fetch_key("world.zip").unwrap_err();
        assert!(matches!(err, EngineError::Crypto(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_key_field_is_a_server_error() {
        let mock = Arc::new(MockHttpClient::new());
        queue_challenge(&mock, "aabbccdd");
        mock.enqueue(EXCHANGE_PATH, HttpResponse::ok(b"{\"x\":1}".to_vec()));

        let err = client_with(mock).fetch_key("world.zip").unwrap_err();
        assert!(matches!(err, EngineError::Server { status: 200, .. }));
    }

    #[test]
    fn batch_aborts_on_first_failure() {
        let mock = Arc::new(MockHttpClient::new());
        // First pack succeeds
        queue_challenge(&mock, "c1");
        let key = PackKey::generate();
        mock.enqueue(
            EXCHANGE_PATH,
            HttpResponse::ok(
                serde_json::to_vec(&ExchangeResponse::new(key.to_hex())).unwrap(),
            ),
        );
        // Second pack is rejected
        queue_challenge(&mock, "c2");
        mock.enqueue(EXCHANGE_PATH, HttpResponse::new(403, b"{}".to_vec()));

        let names = vec!["a.zip".to_string(), "b.zip".to_string()];
        let err = client_with(mock).fetch_keys(&names).unwrap_err();
        assert!(matches!(err, EngineError::Server { status: 403, .. }));
    }
}
