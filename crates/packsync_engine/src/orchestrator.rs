//! Sync session coordination.
//!
//! The orchestrator owns one session at a time and walks it through the
//! state machine: check (config, manifest, scan, plan) and, if the
//! caller decides to proceed, download. Both phases run synchronously on
//! the calling thread; hosts typically dedicate a worker thread and
//! watch progress through observers.

use crate::cancel::CancellationToken;
use crate::config::SyncConfig;
use crate::decrypt;
use crate::downloader::{BatchReport, DownloadEvents, PackDownloader};
use crate::error::{EngineError, EngineResult};
use crate::http::HttpClient;
use crate::identity::PackIdentityReader;
use crate::manifest_client::ManifestClient;
use crate::observer::{ObserverSet, SyncObserver};
use crate::planner::{PackComparator, SyncPlan};
use crate::scanner::PackScanner;
use crate::state::SyncState;
use packsync_protocol::RemoteManifest;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a check session.
#[derive(Debug)]
pub enum CheckOutcome {
    /// The check succeeded and produced a plan.
    PlanReady(SyncPlan),
    /// Sync is disabled by configuration.
    Disabled,
    /// The server was unreachable; proceed with local content.
    Offline,
    /// The check was cancelled.
    Cancelled,
    /// The check failed.
    Failed(EngineError),
}

/// Result of a download session.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The batch ran to the end.
    Complete {
        /// Files installed successfully.
        succeeded: Vec<String>,
        /// Files that failed terminally, with their final error.
        failed: Vec<(String, EngineError)>,
    },
    /// The batch was cancelled.
    Cancelled,
    /// The batch aborted with an error.
    Failed(EngineError),
}

enum CheckFlow {
    Disabled,
    Plan(SyncPlan),
}

/// Coordinates check and download sessions against one server.
pub struct SyncOrchestrator<C: HttpClient, R: PackIdentityReader> {
    config: SyncConfig,
    client: Arc<C>,
    identity_reader: R,
    observers: ObserverSet,
    state: RwLock<SyncState>,
    token: CancellationToken,
    last_manifest: RwLock<Option<RemoteManifest>>,
}

impl<C: HttpClient, R: PackIdentityReader> SyncOrchestrator<C, R> {
    /// Creates an orchestrator.
    pub fn new(config: SyncConfig, client: Arc<C>, identity_reader: R) -> Self {
        Self {
            config,
            client,
            identity_reader,
            observers: ObserverSet::new(),
            state: RwLock::new(SyncState::Idle),
            token: CancellationToken::new(),
            last_manifest: RwLock::new(None),
        }
    }

    /// Registers a lifecycle observer.
    pub fn add_observer(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.register(observer);
    }

    /// Current session state.
    pub fn state(&self) -> SyncState {
        self.state.read().clone()
    }

    /// The cancellation token shared by this orchestrator's sessions.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests cooperative cancellation of the running session.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            info!("Cancel requested");
            self.token.cancel();
        }
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Clears the cancellation flag and returns to `Idle`.
    pub fn reset(&self) {
        self.token.reset();
        self.set_state(SyncState::Idle);
    }

    /// The manifest fetched by the most recent successful check.
    pub fn last_manifest(&self) -> Option<RemoteManifest> {
        self.last_manifest.read().clone()
    }

    /// True when the server answers a ping.
    pub fn test_connection(&self) -> bool {
        ManifestClient::new(&self.config.server_url, self.client.clone()).ping()
    }

    /// Runs a check session: fetch the manifest, scan local packs and
    /// build the plan.
    ///
    /// The caller inspects the outcome and decides whether to invoke
    /// [`download`](Self::download). A connectivity failure during the
    /// manifest fetch comes back as [`CheckOutcome::Offline`] so hosts
    /// can continue with local content.
    pub fn check_for_updates(&self) -> CheckOutcome {
        info!("Checking for pack updates");
        {
            let state = self.state.read();
            if !state.can_start() {
                return CheckOutcome::Failed(EngineError::config(format!(
                    "cannot start a check while {state}"
                )));
            }
        }

        self.set_state(SyncState::LoadingConfig);
        self.observers.check_started();

        match self.run_check() {
            Ok(CheckFlow::Disabled) => {
                info!("Remote sync disabled");
                self.set_state(SyncState::Complete);
                CheckOutcome::Disabled
            }
            Ok(CheckFlow::Plan(plan)) => {
                self.set_state(SyncState::PlanReady);
                self.observers.check_complete(&plan);
                CheckOutcome::PlanReady(plan)
            }
            Err(EngineError::Cancelled) => {
                warn!("Check cancelled");
                self.set_state(SyncState::Cancelled);
                self.observers.cancelled();
                CheckOutcome::Cancelled
            }
            Err(e) if e.is_offline() => {
                warn!("Server unreachable, continuing with local packs: {}", e);
                self.set_state(SyncState::Error(e.to_string()));
                self.observers.error(&e);
                CheckOutcome::Offline
            }
            Err(e) => {
                error!("Check failed: {}", e);
                self.set_state(SyncState::Error(e.to_string()));
                self.observers.error(&e);
                CheckOutcome::Failed(e)
            }
        }
    }

    fn run_check(&self) -> EngineResult<CheckFlow> {
        self.token.check()?;
        self.observers.check_progress(&SyncState::LoadingConfig);

        if !self.config.enabled {
            return Ok(CheckFlow::Disabled);
        }
        if self.config.server_url.trim().is_empty() {
            return Err(EngineError::config("server URL is not set"));
        }
        info!(
            "Server: {}, timeout: {:?}",
            self.config.server_url, self.config.timeout
        );

        self.token.check()?;
        self.set_state(SyncState::FetchingManifest);
        self.observers.check_progress(&SyncState::FetchingManifest);
        let manifest = ManifestClient::new(&self.config.server_url, self.client.clone()).fetch()?;
        info!("Manifest fetched: {} packs", manifest.pack_count());

        self.token.check()?;
        self.set_state(SyncState::ComparingPacks);
        self.observers.check_progress(&SyncState::ComparingPacks);
        let local = PackScanner::new(&self.config, &self.identity_reader).scan()?;
        let plan =
            PackComparator::new(self.config.auto_cleanup_removed).compare(&manifest, &local);

        *self.last_manifest.write() = Some(manifest);
        Ok(CheckFlow::Plan(plan))
    }

    /// Runs the download phase for a plan produced by
    /// [`check_for_updates`](Self::check_for_updates).
    ///
    /// Installs and updates are fetched sequentially into the synced
    /// directory; orphans scheduled in the plan are purged afterwards.
    pub fn download(&self, plan: &SyncPlan) -> DownloadOutcome {
        info!("Starting download");

        if !plan.has_downloads() {
            info!("No files to download");
            self.set_state(SyncState::Complete);
            self.observers.download_complete(0, 0);
            return DownloadOutcome::Complete {
                succeeded: Vec::new(),
                failed: Vec::new(),
            };
        }

        let total = plan.total_to_download();
        self.set_state(SyncState::Downloading { current: 0, total });

        match self.run_download(plan, total) {
            Ok(report) => {
                self.set_state(SyncState::Complete);
                self.observers
                    .download_complete(report.succeeded_count(), report.failed_count());
                info!(
                    "Download complete: {} succeeded, {} failed",
                    report.succeeded_count(),
                    report.failed_count()
                );
                DownloadOutcome::Complete {
                    succeeded: report.succeeded,
                    failed: report.failed,
                }
            }
            Err(EngineError::Cancelled) => {
                warn!("Download cancelled");
                self.set_state(SyncState::Cancelled);
                self.observers.cancelled();
                DownloadOutcome::Cancelled
            }
            Err(e) => {
                error!("Download failed: {}", e);
                self.set_state(SyncState::Error(e.to_string()));
                self.observers.error(&e);
                DownloadOutcome::Failed(e)
            }
        }
    }

    fn run_download(&self, plan: &SyncPlan, total: usize) -> EngineResult<BatchReport> {
        self.token.check()?;

        let downloader = PackDownloader::new(
            &self.config.server_url,
            self.client.clone(),
            self.config.synced_dir(),
            self.config.retry.clone(),
        );

        let packs = plan.downloads();
        info!(
            "Downloading {} files, {} bytes total",
            packs.len(),
            plan.total_download_bytes()
        );
        self.observers
            .download_started(total, plan.total_download_bytes());

        let bridge = DownloadBridge {
            state: &self.state,
            observers: &self.observers,
        };
        let report = downloader.download_all(
            &packs,
            &self.token,
            &bridge,
            self.config.cancel_on_first_error,
        )?;

        if !plan.to_purge.is_empty() {
            info!("Cleaning up {} removed packs", plan.to_purge.len());
            downloader.purge(&plan.to_purge);
        }
        Ok(report)
    }

    /// Decrypts the synced encrypted packs listed in `manifest` into
    /// memory, fetching their keys over the challenge handshake.
    pub fn decrypt_synced_packs(
        &self,
        manifest: &RemoteManifest,
    ) -> EngineResult<HashMap<String, Vec<u8>>> {
        decrypt::decrypt_synced_packs(&self.config, self.client.clone(), manifest)
    }

    fn set_state(&self, state: SyncState) {
        debug!("State: {}", state);
        *self.state.write() = state;
    }
}

struct DownloadBridge<'a> {
    state: &'a RwLock<SyncState>,
    observers: &'a ObserverSet,
}

impl DownloadEvents for DownloadBridge<'_> {
    fn on_started(&self, filename: &str, index: usize, total: usize) {
        *self.state.write() = SyncState::Downloading {
            current: index,
            total,
        };
        self.observers.file_started(filename, index, total);
    }

    fn on_progress(&self, filename: &str, received: u64, total: u64) {
        self.observers.file_progress(filename, received, total);
    }

    fn on_complete(&self, filename: &str) {
        self.observers.file_complete(filename);
    }
}
