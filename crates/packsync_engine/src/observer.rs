//! Sync lifecycle observers.
//!
//! Hosts register observers to drive UI from sync progress. Observers
//! are isolated: one that panics is logged and skipped, and can never
//! abort the run.

use crate::error::EngineError;
use crate::planner::SyncPlan;
use crate::state::SyncState;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

/// Receives sync lifecycle notifications.
///
/// All methods default to no-ops so implementors pick what they need.
pub trait SyncObserver: Send + Sync {
    /// A check session started.
    fn on_check_started(&self) {}

    /// The check moved to a new phase.
    fn on_check_progress(&self, _state: &SyncState) {}

    /// The check produced a plan.
    fn on_check_complete(&self, _plan: &SyncPlan) {}

    /// The download phase started.
    fn on_download_started(&self, _files: usize, _total_bytes: u64) {}

    /// A file download started.
    fn on_file_started(&self, _filename: &str, _index: usize, _total: usize) {}

    /// Bytes arrived for a file. `total` is the declared size.
    fn on_file_progress(&self, _filename: &str, _received: u64, _total: u64) {}

    /// A file was verified and installed.
    fn on_file_complete(&self, _filename: &str) {}

    /// The download phase finished.
    fn on_download_complete(&self, _succeeded: usize, _failed: usize) {}

    /// The session failed.
    fn on_error(&self, _error: &EngineError) {}

    /// The session was cancelled.
    fn on_cancelled(&self) {}
}

/// Fan-out to registered observers.
#[derive(Default)]
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn SyncObserver>>>,
}

impl ObserverSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    pub fn register(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// True when no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    fn each<F: Fn(&dyn SyncObserver)>(&self, event: &str, f: F) {
        for observer in self.observers.read().iter() {
            let result = catch_unwind(AssertUnwindSafe(|| f(observer.as_ref())));
            if result.is_err() {
                warn!("Observer panicked during {}, continuing", event);
            }
        }
    }

    /// Notifies [`SyncObserver::on_check_started`].
    pub fn check_started(&self) {
        self.each("check_started", |o| o.on_check_started());
    }

    /// Notifies [`SyncObserver::on_check_progress`].
    pub fn check_progress(&self, state: &SyncState) {
        self.each("check_progress", |o| o.on_check_progress(state));
    }

    /// Notifies [`SyncObserver::on_check_complete`].
    pub fn check_complete(&self, plan: &SyncPlan) {
        self.each("check_complete", |o| o.on_check_complete(plan));
    }

    /// Notifies [`SyncObserver::on_download_started`].
    pub fn download_started(&self, files: usize, total_bytes: u64) {
        self.each("download_started", |o| o.on_download_started(files, total_bytes));
    }

    /// Notifies [`SyncObserver::on_file_started`].
    pub fn file_started(&self, filename: &str, index: usize, total: usize) {
        self.each("file_started", |o| o.on_file_started(filename, index, total));
    }

    /// Notifies [`SyncObserver::on_file_progress`].
    pub fn file_progress(&self, filename: &str, received: u64, total: u64) {
        self.each("file_progress", |o| o.on_file_progress(filename, received, total));
    }

    /// Notifies [`SyncObserver::on_file_complete`].
    pub fn file_complete(&self, filename: &str) {
        self.each("file_complete", |o| o.on_file_complete(filename));
    }

    /// Notifies [`SyncObserver::on_download_complete`].
    pub fn download_complete(&self, succeeded: usize, failed: usize) {
        self.each("download_complete", |o| o.on_download_complete(succeeded, failed));
    }

    /// Notifies [`SyncObserver::on_error`].
    pub fn error(&self, error: &EngineError) {
        self.each("error", |o| o.on_error(error));
    }

    /// Notifies [`SyncObserver::on_cancelled`].
    pub fn cancelled(&self) {
        self.each("cancelled", |o| o.on_cancelled());
    }
}

/// Observer that logs lifecycle events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl SyncObserver for ConsoleObserver {
    fn on_check_started(&self) {
        info!("Sync check started");
    }

    fn on_check_progress(&self, state: &SyncState) {
        info!("Sync: {}", state);
    }

    fn on_check_complete(&self, plan: &SyncPlan) {
        info!(
            "Sync check complete: {} to download, {} up to date, {} conflicts",
            plan.total_to_download(),
            plan.up_to_date.len(),
            plan.identity_conflicts.len()
        );
    }

    fn on_download_started(&self, files: usize, total_bytes: u64) {
        info!("Downloading {} packs ({} bytes)", files, total_bytes);
    }

    fn on_file_started(&self, filename: &str, index: usize, total: usize) {
        info!("[{}/{}] {}", index, total, filename);
    }

    fn on_file_complete(&self, filename: &str) {
        info!("Installed {}", filename);
    }

    fn on_download_complete(&self, succeeded: usize, failed: usize) {
        info!("Download complete: {} succeeded, {} failed", succeeded, failed);
    }

    fn on_error(&self, error: &EngineError) {
        warn!("Sync failed: {}", error);
    }

    fn on_cancelled(&self) {
        info!("Sync cancelled");
    }
}
