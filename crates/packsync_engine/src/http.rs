//! Blocking HTTP client abstraction.
//!
//! The engine runs synchronously on a worker thread, so the client is a
//! blocking trait. The real implementation wraps `reqwest`; tests use
//! [`MockHttpClient`] with canned responses instead of a network.

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::time::Duration;

/// Joins a server base URL with a path, normalizing slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// A 200 response with the given body.
    pub fn ok(body: Vec<u8>) -> Self {
        Self::new(200, body)
    }

    /// True for status 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// A streaming HTTP response for large bodies.
pub struct HttpStream {
    /// HTTP status code.
    pub status: u16,
    /// Body reader, consumed incrementally.
    pub body: Box<dyn Read + Send>,
}

/// Blocking HTTP client used by every network-facing engine component.
///
/// Implementations return [`EngineError::Network`] for connect, timeout
/// and mid-transfer failures; HTTP error statuses come back as ordinary
/// responses for the caller to interpret.
pub trait HttpClient: Send + Sync {
    /// Fetches a URL, buffering the whole body.
    fn get(&self, url: &str) -> EngineResult<HttpResponse>;

    /// Fetches a URL as a stream for chunked consumption.
    fn get_stream(&self, url: &str) -> EngineResult<HttpStream>;

    /// Posts a JSON body and buffers the response.
    fn post_json(&self, url: &str, body: &[u8]) -> EngineResult<HttpResponse>;
}

/// [`HttpClient`] backed by a blocking `reqwest` client.
#[derive(Debug)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the given timeout on connects and requests.
    pub fn new(timeout: Duration) -> EngineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| EngineError::config(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

fn network_err(e: reqwest::Error) -> EngineError {
    EngineError::network(e.to_string())
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> EngineResult<HttpResponse> {
        let response = self.client.get(url).send().map_err(network_err)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(network_err)?.to_vec();
        Ok(HttpResponse { status, body })
    }

    fn get_stream(&self, url: &str) -> EngineResult<HttpStream> {
        let response = self.client.get(url).send().map_err(network_err)?;
        Ok(HttpStream {
            status: response.status().as_u16(),
            body: Box::new(response),
        })
    }

    fn post_json(&self, url: &str, body: &[u8]) -> EngineResult<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_vec())
            .send()
            .map_err(network_err)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(network_err)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// In-memory [`HttpClient`] serving canned responses, for tests.
///
/// Responses are queued per path and consumed in order; a request for a
/// path with an empty queue fails the test loudly. Requests are recorded
/// so tests can assert on what was sent.
#[derive(Default)]
pub struct MockHttpClient {
    responses: Mutex<HashMap<String, VecDeque<EngineResult<HttpResponse>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// One request a [`MockHttpClient`] observed.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Full URL as requested.
    pub url: String,
    /// Body for POSTs, `None` for GETs.
    pub body: Option<Vec<u8>>,
}

impl MockHttpClient {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for requests whose URL ends with `path`.
    pub fn enqueue(&self, path: &str, response: HttpResponse) {
        self.responses
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    /// Queues an error for requests whose URL ends with `path`.
    pub fn enqueue_error(&self, path: &str, error: EngineError) {
        self.responses
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Everything requested so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    fn take(&self, url: &str) -> EngineResult<HttpResponse> {
        let mut responses = self.responses.lock();
        let key = responses
            .keys()
            .find(|path| url.ends_with(path.as_str()))
            .cloned();
        match key {
            Some(key) => {
                let queue = responses.get_mut(&key);
                match queue.and_then(|q| q.pop_front()) {
                    Some(result) => result,
                    None => Err(EngineError::unknown(format!(
                        "mock has no responses left for {url}"
                    ))),
                }
            }
            None => Err(EngineError::unknown(format!(
                "mock has no response queued for {url}"
            ))),
        }
    }

    fn record(&self, url: &str, body: Option<&[u8]>) {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            body: body.map(<[u8]>::to_vec),
        });
    }
}

impl HttpClient for MockHttpClient {
    fn get(&self, url: &str) -> EngineResult<HttpResponse> {
        self.record(url, None);
        self.take(url)
    }

    fn get_stream(&self, url: &str) -> EngineResult<HttpStream> {
        self.record(url, None);
        let response = self.take(url)?;
        Ok(HttpStream {
            status: response.status,
            body: Box::new(std::io::Cursor::new(response.body)),
        })
    }

    fn post_json(&self, url: &str, body: &[u8]) -> EngineResult<HttpResponse> {
        self.record(url, Some(body));
        self.take(url)
    }
}
