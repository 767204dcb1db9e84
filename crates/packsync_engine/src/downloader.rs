//! Atomic, retryable pack downloads.
//!
//! Each pack streams into a `<name>.downloading` sibling, is hash-checked
//! there, and is then moved onto the target name through a `.backup`
//! rename dance. The target filename is never observable half-written,
//! and an interrupted run leaves only temp artifacts that the next run
//! sweeps.

use crate::cancel::CancellationToken;
use crate::config::RetryPolicy;
use crate::error::{EngineError, EngineResult};
use crate::http::{join_url, HttpClient};
use packsync_crypto::{content_hash_reader, hashes_match};
use packsync_protocol::RemotePackDescriptor;
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Bytes read and written per chunk.
pub const CHUNK_SIZE: usize = 8192;

/// Suffix of in-flight download files.
pub const TEMP_SUFFIX: &str = ".downloading";

/// Suffix of displaced previous versions during an install.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Per-file callbacks during a download batch.
///
/// Default implementations are no-ops.
pub trait DownloadEvents {
    /// File `index` of `total` started.
    fn on_started(&self, _filename: &str, _index: usize, _total: usize) {}

    /// A chunk arrived. `total` is the declared size from the manifest.
    fn on_progress(&self, _filename: &str, _received: u64, _total: u64) {}

    /// The file was verified and installed.
    fn on_complete(&self, _filename: &str) {}
}

/// Events sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl DownloadEvents for NoEvents {}

/// Outcome of a download batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Filenames installed successfully.
    pub succeeded: Vec<String>,
    /// Filenames that exhausted their retries, with the final error.
    pub failed: Vec<(String, EngineError)>,
}

impl BatchReport {
    /// Number of successful installs.
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Number of terminal failures.
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// True when every file installed.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Downloads packs into the managed directory.
pub struct PackDownloader<C: HttpClient> {
    base_url: String,
    client: Arc<C>,
    target_dir: PathBuf,
    retry: RetryPolicy,
}

impl<C: HttpClient> PackDownloader<C> {
    /// Creates a downloader writing into `target_dir`.
    pub fn new(
        server_url: &str,
        client: Arc<C>,
        target_dir: impl Into<PathBuf>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            client,
            target_dir: target_dir.into(),
            retry,
        }
    }

    /// Removes stray temp and backup files from interrupted runs.
    pub fn sweep_temp_files(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.target_dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(TEMP_SUFFIX) && !name.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Swept stray file {:?}", path);
                    removed += 1;
                }
                Err(e) => warn!("Failed to sweep {:?}: {}", path, e),
            }
        }
        if removed > 0 {
            info!("Swept {} stray download artifacts", removed);
        }
        removed
    }

    /// Downloads every pack sequentially, in the given order.
    ///
    /// Per-file failures land in the report after retries are exhausted;
    /// the batch keeps going unless `cancel_on_error` is set. Returns an
    /// error only for cancellation or a failure under `cancel_on_error`.
    pub fn download_all(
        &self,
        packs: &[RemotePackDescriptor],
        token: &CancellationToken,
        events: &dyn DownloadEvents,
        cancel_on_error: bool,
    ) -> EngineResult<BatchReport> {
        fs::create_dir_all(&self.target_dir)
            .map_err(|e| EngineError::file(self.target_dir.display().to_string(), e.to_string()))?;
        self.sweep_temp_files();

        let total = packs.len();
        let mut report = BatchReport::default();

        for (index, pack) in packs.iter().enumerate() {
            token.check()?;
            events.on_started(&pack.name, index + 1, total);

            match self.download_file(pack, token, events) {
                Ok(()) => {
                    events.on_complete(&pack.name);
                    report.succeeded.push(pack.name.clone());
                }
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) if cancel_on_error => {
                    warn!("Aborting batch after failure on {}: {}", pack.name, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Pack {} failed terminally: {}", pack.name, e);
                    report.failed.push((pack.name.clone(), e));
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed",
            report.succeeded_count(),
            report.failed_count()
        );
        Ok(report)
    }

    /// Downloads one pack with retries.
    pub fn download_file(
        &self,
        pack: &RemotePackDescriptor,
        token: &CancellationToken,
        events: &dyn DownloadEvents,
    ) -> EngineResult<()> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                thread::sleep(self.retry.delay);
            }
            token.check()?;

            match self.attempt_download(pack, token, events) {
                Ok(()) => return Ok(()),
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt, attempts, pack.name, e
                    );
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Err(EngineError::unknown(format!(
                "download of {} ended without attempts",
                pack.name
            ))),
        }
    }

    /// Removes previously synced files the server no longer lists.
    pub fn purge(&self, filenames: &[String]) -> usize {
        let mut removed = 0;
        for filename in filenames {
            let path = self.target_dir.join(filename);
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("Purged {}", filename);
                    removed += 1;
                }
                Err(e) => warn!("Failed to purge {}: {}", filename, e),
            }
        }
        removed
    }

    fn attempt_download(
        &self,
        pack: &RemotePackDescriptor,
        token: &CancellationToken,
        events: &dyn DownloadEvents,
    ) -> EngineResult<()> {
        let target = self.target_dir.join(&pack.name);
        let temp = self.target_dir.join(format!("{}{}", pack.name, TEMP_SUFFIX));

        let staged = self
            .stream_to_temp(pack, &temp, token, events)
            .and_then(|()| verify_hash(&temp, pack));
        if let Err(e) = staged {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        atomic_install(&temp, &target, &pack.name)
    }

    fn stream_to_temp(
        &self,
        pack: &RemotePackDescriptor,
        temp: &Path,
        token: &CancellationToken,
        events: &dyn DownloadEvents,
    ) -> EngineResult<()> {
        let url = join_url(&self.base_url, &pack.url);
        debug!("Downloading {} from {}", pack.name, url);

        let mut stream = self.client.get_stream(&url)?;
        match stream.status {
            200 => {}
            404 => {
                return Err(EngineError::server(
                    404,
                    format!("pack not found: {}", pack.name),
                ))
            }
            status => {
                return Err(EngineError::server(
                    status,
                    format!("download failed: HTTP {status}"),
                ))
            }
        }

        let file = fs::File::create(temp)
            .map_err(|e| EngineError::file(&pack.name, e.to_string()))?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut buf = [0u8; CHUNK_SIZE];
        let mut received: u64 = 0;

        loop {
            token.check()?;
            let n = stream
                .body
                .read(&mut buf)
                .map_err(|e| EngineError::network(format!("read failed: {e}")))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .map_err(|e| EngineError::file(&pack.name, e.to_string()))?;
            received += n as u64;
            events.on_progress(&pack.name, received, pack.size);
        }

        writer
            .flush()
            .map_err(|e| EngineError::file(&pack.name, e.to_string()))?;
        Ok(())
    }
}

fn verify_hash(temp: &Path, pack: &RemotePackDescriptor) -> EngineResult<()> {
    let mut file =
        fs::File::open(temp).map_err(|e| EngineError::file(&pack.name, e.to_string()))?;
    let actual =
        content_hash_reader(&mut file).map_err(|e| EngineError::file(&pack.name, e.to_string()))?;

    if !hashes_match(&actual, &pack.md5) {
        return Err(EngineError::Integrity {
            filename: pack.name.clone(),
            expected: pack.md5.to_ascii_lowercase(),
            actual,
        });
    }
    Ok(())
}

fn atomic_install(temp: &Path, target: &Path, filename: &str) -> EngineResult<()> {
    let backup = target.with_file_name(format!("{filename}{BACKUP_SUFFIX}"));

    let had_previous = target.is_file();
    if had_previous {
        if backup.exists() {
            let _ = fs::remove_file(&backup);
        }
        fs::rename(target, &backup)
            .map_err(|e| EngineError::file(filename, format!("backup failed: {e}")))?;
    }

    match fs::rename(temp, target) {
        Ok(()) => {
            if had_previous {
                let _ = fs::remove_file(&backup);
            }
            debug!("Installed {}", filename);
            Ok(())
        }
        Err(e) => {
            if had_previous {
                if let Err(restore) = fs::rename(&backup, target) {
                    warn!("Failed to restore backup for {}: {}", filename, restore);
                }
            }
            Err(EngineError::file(filename, format!("install failed: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};
    use packsync_crypto::content_hash;
    use std::sync::Mutex;
    use std::time::Duration;

    fn pack_for(name: &str, body: &[u8]) -> RemotePackDescriptor {
        RemotePackDescriptor::new(name, content_hash(body), body.len() as u64)
    }

    fn downloader(
        mock: Arc<MockHttpClient>,
        dir: &Path,
        retry: RetryPolicy,
    ) -> PackDownloader<MockHttpClient> {
        PackDownloader::new("http://host:8080", mock, dir, retry)
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[test]
    fn downloads_verifies_and_installs() {
        let tmp = tempfile::tempdir().unwrap();
        let body = b"pack contents".to_vec();
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/packs/a.zip", HttpResponse::ok(body.clone()));

        let dl = downloader(mock, tmp.path(), fast_retry(3));
        let report = dl
            .download_all(
                &[pack_for("a.zip", &body)],
                &CancellationToken::new(),
                &NoEvents,
                false,
            )
            .unwrap();

        assert_eq!(report.succeeded, vec!["a.zip".to_string()]);
        assert!(report.all_succeeded());
        assert_eq!(fs::read(tmp.path().join("a.zip")).unwrap(), body);
        assert!(!tmp.path().join("a.zip.downloading").exists());
    }

    #[test]
    fn corrupt_body_retries_then_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        for _ in 0..3 {
            mock.enqueue("/packs/a.zip", HttpResponse::ok(b"corrupted".to_vec()));
        }

        let pack = pack_for("a.zip", b"expected contents");
        let dl = downloader(mock.clone(), tmp.path(), fast_retry(3));
        let report = dl
            .download_all(&[pack], &CancellationToken::new(), &NoEvents, false)
            .unwrap();

        assert_eq!(report.failed_count(), 1);
        assert!(matches!(report.failed[0].1, EngineError::Integrity { .. }));
        // One request per attempt
        assert_eq!(mock.requests().len(), 3);
        // No artifacts left behind
        assert!(!tmp.path().join("a.zip").exists());
        assert!(!tmp.path().join("a.zip.downloading").exists());
    }

    #[test]
    fn replaces_existing_file_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.zip"), b"old version").unwrap();

        let body = b"new version".to_vec();
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/packs/a.zip", HttpResponse::ok(body.clone()));

        let dl = downloader(mock, tmp.path(), fast_retry(1));
        let report = dl
            .download_all(
                &[pack_for("a.zip", &body)],
                &CancellationToken::new(),
                &NoEvents,
                false,
            )
            .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(fs::read(tmp.path().join("a.zip")).unwrap(), body);
        assert!(!tmp.path().join("a.zip.backup").exists());
    }

    #[test]
    fn missing_pack_is_a_server_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/packs/a.zip", HttpResponse::new(404, Vec::new()));

        let dl = downloader(mock, tmp.path(), fast_retry(1));
        let report = dl
            .download_all(
                &[pack_for("a.zip", b"x")],
                &CancellationToken::new(),
                &NoEvents,
                false,
            )
            .unwrap();

        assert!(matches!(
            report.failed[0].1,
            EngineError::Server { status: 404, .. }
        ));
    }

    #[test]
    fn cancellation_stops_the_batch_and_is_not_retried() {
        struct CancelAfterFirstChunk {
            token: CancellationToken,
        }
        impl DownloadEvents for CancelAfterFirstChunk {
            fn on_progress(&self, _filename: &str, _received: u64, _total: u64) {
                self.token.cancel();
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        // Body larger than one chunk so the loop runs more than once
        let body = vec![7u8; CHUNK_SIZE * 3];
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/packs/big.zip", HttpResponse::ok(body.clone()));
        mock.enqueue("/packs/next.zip", HttpResponse::ok(b"x".to_vec()));

        let token = CancellationToken::new();
        let events = CancelAfterFirstChunk {
            token: token.clone(),
        };
        let dl = downloader(mock.clone(), tmp.path(), fast_retry(3));
        let err = dl
            .download_all(
                &[pack_for("big.zip", &body), pack_for("next.zip", b"x")],
                &token,
                &events,
                false,
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
        // No retry of the cancelled file and no second file requested
        assert_eq!(mock.requests().len(), 1);
        assert!(!tmp.path().join("big.zip.downloading").exists());
        assert!(!tmp.path().join("big.zip").exists());
    }

    #[test]
    fn cancel_on_error_aborts_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/packs/bad.zip", HttpResponse::new(404, Vec::new()));
        mock.enqueue("/packs/good.zip", HttpResponse::ok(b"x".to_vec()));

        let dl = downloader(mock.clone(), tmp.path(), fast_retry(1));
        let err = dl
            .download_all(
                &[pack_for("bad.zip", b"y"), pack_for("good.zip", b"x")],
                &CancellationToken::new(),
                &NoEvents,
                true,
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::Server { status: 404, .. }));
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn sweeps_stray_artifacts_before_downloading() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("stale.zip.downloading"), b"junk").unwrap();
        fs::write(tmp.path().join("stale.zip.backup"), b"junk").unwrap();
        fs::write(tmp.path().join("keep.zip"), b"real").unwrap();

        let mock = Arc::new(MockHttpClient::new());
        let dl = downloader(mock, tmp.path(), fast_retry(1));
        let removed = dl.sweep_temp_files();

        assert_eq!(removed, 2);
        assert!(tmp.path().join("keep.zip").exists());
        assert!(!tmp.path().join("stale.zip.downloading").exists());
        assert!(!tmp.path().join("stale.zip.backup").exists());
    }

    #[test]
    fn purge_removes_listed_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("gone.zip"), b"x").unwrap();

        let mock = Arc::new(MockHttpClient::new());
        let dl = downloader(mock, tmp.path(), fast_retry(1));
        let removed = dl.purge(&["gone.zip".to_string(), "never-there.zip".to_string()]);

        assert_eq!(removed, 1);
        assert!(!tmp.path().join("gone.zip").exists());
    }

    #[test]
    fn progress_reports_cumulative_bytes() {
        #[derive(Default)]
        struct Recording {
            seen: Mutex<Vec<u64>>,
        }
        impl DownloadEvents for Recording {
            fn on_progress(&self, _filename: &str, received: u64, _total: u64) {
                self.seen.lock().unwrap().push(received);
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let body = vec![1u8; CHUNK_SIZE + 100];
        let mock = Arc::new(MockHttpClient::new());
        mock.enqueue("/packs/a.zip", HttpResponse::ok(body.clone()));

        let events = Recording::default();
        let dl = downloader(mock, tmp.path(), fast_retry(1));
        dl.download_all(
            &[pack_for("a.zip", &body)],
            &CancellationToken::new(),
            &events,
            false,
        )
        .unwrap();

        let seen = events.seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert_eq!(*seen.last().unwrap(), body.len() as u64);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
