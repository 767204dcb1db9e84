//! Sync session states.

use std::fmt;

/// Phase of a sync session.
///
/// A session moves `Idle → LoadingConfig → FetchingManifest →
/// ComparingPacks → PlanReady → Downloading → Complete`. `Cancelled` and
/// `Error` are reachable from any active phase. The download phase is
/// only entered when the caller asks for it with a plan in hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// No session has run yet.
    Idle,
    /// Reading and validating configuration.
    LoadingConfig,
    /// Fetching the remote manifest.
    FetchingManifest,
    /// Scanning local packs and building the plan.
    ComparingPacks,
    /// A plan is ready; waiting for the caller to start downloads.
    PlanReady,
    /// Downloading file `current` of `total`.
    Downloading {
        /// 1-based index of the file being fetched.
        current: usize,
        /// Total files in this batch.
        total: usize,
    },
    /// The session finished.
    Complete,
    /// The session was cancelled cooperatively.
    Cancelled,
    /// The session failed.
    Error(String),
}

impl SyncState {
    /// True while a phase is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::LoadingConfig
                | SyncState::FetchingManifest
                | SyncState::ComparingPacks
                | SyncState::Downloading { .. }
        )
    }

    /// True once the session has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Complete | SyncState::Cancelled | SyncState::Error(_)
        )
    }

    /// True when a new check may begin.
    pub fn can_start(&self) -> bool {
        !self.is_active()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Idle
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::LoadingConfig => write!(f, "loading config"),
            SyncState::FetchingManifest => write!(f, "fetching manifest"),
            SyncState::ComparingPacks => write!(f, "comparing packs"),
            SyncState::PlanReady => write!(f, "plan ready"),
            SyncState::Downloading { current, total } => {
                write!(f, "downloading {current}/{total}")
            }
            SyncState::Complete => write!(f, "complete"),
            SyncState::Cancelled => write!(f, "cancelled"),
            SyncState::Error(message) => write!(f, "error: {message}"),
        }
    }
}
