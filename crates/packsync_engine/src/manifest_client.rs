//! Manifest and ping endpoints.

use crate::error::{EngineError, EngineResult};
use crate::http::{join_url, HttpClient};
use packsync_protocol::{PingResponse, RemoteManifest, MANIFEST_PATH, PING_PATH};
use std::sync::Arc;
use tracing::debug;

const BODY_SNIPPET_LEN: usize = 200;

/// Fetches the remote manifest and probes server reachability.
#[derive(Debug)]
pub struct ManifestClient<C: HttpClient> {
    base_url: String,
    client: Arc<C>,
}

impl<C: HttpClient> ManifestClient<C> {
    /// Creates a client against `server_url`.
    pub fn new(server_url: &str, client: Arc<C>) -> Self {
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Fetches and parses the manifest.
    ///
    /// Connectivity failures surface as network errors so the caller can
    /// classify the run as offline; an HTTP error status or a body that
    /// does not parse is a server error.
    pub fn fetch(&self) -> EngineResult<RemoteManifest> {
        let url = join_url(&self.base_url, MANIFEST_PATH);
        debug!("Fetching manifest from {}", url);

        let response = self.client.get(&url)?;
        if !response.is_ok() {
            return Err(EngineError::server(
                response.status,
                body_snippet(&response.body),
            ));
        }

        let manifest = RemoteManifest::from_json(&response.body)
            .map_err(|e| EngineError::server(response.status, format!("malformed manifest: {e}")))?;
        debug!(
            "Manifest {}: {} packs, encrypted={}",
            manifest.version,
            manifest.pack_count(),
            manifest.is_encrypted()
        );
        Ok(manifest)
    }

    /// True when the server answers the ping endpoint with an ok status.
    pub fn ping(&self) -> bool {
        let url = join_url(&self.base_url, PING_PATH);
        match self.client.get(&url) {
            Ok(response) if response.is_ok() => {
                match serde_json::from_slice::<PingResponse>(&response.body) {
                    Ok(ping) => ping.status == "ok",
                    Err(_) => false,
                }
            }
            Ok(response) => {
                debug!("Ping returned status {}", response.status);
                false
            }
            Err(e) => {
                debug!("Ping failed: {}", e);
                false
            }
        }
    }
}

fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut snippet: String = text.chars().take(BODY_SNIPPET_LEN).collect();
    if text.chars().count() > BODY_SNIPPET_LEN {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};
    use packsync_protocol::RemotePackDescriptor;

    fn manifest_json() -> Vec<u8> {
        RemoteManifest::new(42, vec![RemotePackDescriptor::new("a.zip", "abc", 3)])
            .to_json()
            .unwrap()
    }

    #[test]
    fn fetches_and_parses_manifest() {
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/manifest.json", HttpResponse::ok(manifest_json()));

        let client = ManifestClient::new("http://host:8080/", mock);
        let manifest = client.fetch().unwrap();
        assert_eq!(manifest.pack_count(), 1);
        assert_eq!(manifest.packs[0].name, "a.zip");
    }

    #[test]
    fn http_error_is_a_server_error() {
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue(
            "/manifest.json",
            HttpResponse::new(500, b"internal".to_vec()),
        );

        let client = ManifestClient::new("http://host:8080", mock);
        let err = client.fetch().unwrap_err();
        assert!(matches!(err, EngineError::Server { status: 500, .. }));
        assert!(!err.is_offline());
    }

    #[test]
    fn malformed_body_is_a_server_error() {
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/manifest.json", HttpResponse::ok(b"not json".to_vec()));

        let client = ManifestClient::new("http://host:8080", mock);
        let err = client.fetch().unwrap_err();
        assert!(matches!(err, EngineError::Server { .. }));
    }

    #[test]
    fn connectivity_failure_stays_a_network_error() {
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue_error("/manifest.json", EngineError::network("refused"));

        let client = ManifestClient::new("http://host:8080", mock);
        assert!(client.fetch().unwrap_err().is_offline());
    }

    #[test]
    fn ping_interprets_status() {
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue(
            "/ping",
            HttpResponse::ok(
                serde_json::to_vec(&PingResponse::ok("0.3.0", 1)).unwrap(),
            ),
        );
        mock.enqueue("/ping", HttpResponse::new(503, Vec::new()));
        mock.enqueue_error("/ping", EngineError::network("refused"));

        let client = ManifestClient::new("http://host:8080", mock);
        assert!(client.ping());
        assert!(!client.ping());
        assert!(!client.ping());
    }
}
