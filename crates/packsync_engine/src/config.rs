//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the managed subdirectory that holds synced packs, kept apart
/// from user-placed ones.
pub const SYNCED_SUBDIR: &str = "synced";

/// Configuration for a sync run.
///
/// The host application owns config-file parsing; this struct is the
/// already-resolved form it hands to the engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether sync is enabled at all. Disabled runs short-circuit to a
    /// completed state without touching the network.
    pub enabled: bool,
    /// Base URL of the pack server.
    pub server_url: String,
    /// Timeout applied to every blocking network call.
    pub timeout: Duration,
    /// Directory holding user-placed packs; the managed subdirectory
    /// lives underneath it.
    pub pack_dir: PathBuf,
    /// Abort the whole batch on the first failed file instead of
    /// collecting per-file failures.
    pub cancel_on_first_error: bool,
    /// Delete synced packs the manifest no longer lists.
    pub auto_cleanup_removed: bool,
    /// Per-file download retry policy.
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Creates a disabled default configuration rooted at `pack_dir`.
    pub fn new(pack_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: false,
            server_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(10),
            pack_dir: pack_dir.into(),
            cancel_on_first_error: false,
            auto_cleanup_removed: true,
            retry: RetryPolicy::default(),
        }
    }

    /// Enables or disables sync.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the server base URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Sets the network timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the cancel-on-first-error policy.
    pub fn with_cancel_on_first_error(mut self, cancel: bool) -> Self {
        self.cancel_on_first_error = cancel;
        self
    }

    /// Sets whether orphaned synced packs are deleted.
    pub fn with_auto_cleanup(mut self, cleanup: bool) -> Self {
        self.auto_cleanup_removed = cleanup;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Directory synced packs are installed into.
    pub fn synced_dir(&self) -> PathBuf {
        self.pack_dir.join(SYNCED_SUBDIR)
    }

    /// Directory holding user-placed packs.
    pub fn manual_dir(&self) -> &Path {
        &self.pack_dir
    }
}

/// Per-file download retry policy.
///
/// Defaults match the fixed behavior of the protocol: three attempts with
/// one second between them. Cancellation is never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per file, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A policy that gives up after the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}
