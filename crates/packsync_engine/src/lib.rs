//! # packsync engine
//!
//! Client-side pack synchronization engine.
//!
//! This crate provides:
//! - Sync orchestrator and state machine (idle → checking → plan ready → downloading)
//! - Local pack scanner and UUID-aware sync planner
//! - Atomic, retryable pack downloader
//! - Challenge-response key exchange client and in-memory decryption
//! - Cooperative cancellation and lifecycle observers
//!
//! ## Architecture
//!
//! A sync session runs in two caller-driven phases:
//! 1. **Check**: fetch the manifest, scan local packs, build a [`SyncPlan`]
//! 2. **Download**: materialize the plan into the managed directory
//!
//! The split is deliberate. The host inspects the plan (sizes, conflicts,
//! orphans) and decides whether to download, defer or skip.
//!
//! ## Key Invariants
//!
//! - Manual packs always win identity conflicts and are never overwritten
//! - A pack filename is never observable in a half-written state
//! - Cancellation is cooperative and never retried
//! - A network failure during checking classifies as offline, not error

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod decrypt;
mod downloader;
mod error;
mod http;
mod identity;
mod key_client;
mod manifest_client;
mod observer;
mod orchestrator;
mod planner;
mod scanner;
mod state;

pub use cancel::CancellationToken;
pub use config::{RetryPolicy, SyncConfig, SYNCED_SUBDIR};
pub use decrypt::decrypt_synced_packs;
pub use downloader::{
    BatchReport, DownloadEvents, NoEvents, PackDownloader, BACKUP_SUFFIX, CHUNK_SIZE, TEMP_SUFFIX,
};
pub use error::{EngineError, EngineResult};
pub use http::{HttpClient, HttpResponse, HttpStream, MockHttpClient, RecordedRequest, ReqwestClient};
pub use identity::{MemoryIdentityReader, NoIdentityReader, PackIdentity, PackIdentityReader};
pub use key_client::KeyExchangeClient;
pub use manifest_client::ManifestClient;
pub use observer::{ConsoleObserver, ObserverSet, SyncObserver};
pub use orchestrator::{CheckOutcome, DownloadOutcome, SyncOrchestrator};
pub use planner::{IdentityConflict, PackComparator, SyncPlan};
pub use scanner::{LocalPackRecord, PackScanner, SourceKind};
pub use state::SyncState;
