//! One-time challenge store for the key exchange.

use crate::clock;
use dashmap::DashMap;
use packsync_crypto::{generate_challenge, verify_proof};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// How long an issued challenge stays valid.
pub const CHALLENGE_TTL_MS: u64 = 30_000;

/// Minimum interval between opportunistic sweeps of stale challenges.
pub const CLEANUP_INTERVAL_MS: u64 = 60_000;

struct ChallengeRecord {
    created_at: u64,
    used: bool,
}

/// Issues random challenges and verifies the HMAC proofs presented against
/// them, consuming each challenge on first use.
///
/// A challenge authorizes at most one exchange attempt: a failed proof
/// burns it just like a successful one, so an attacker cannot probe the
/// same challenge twice.
pub struct ChallengeStore {
    shared_secret: String,
    records: DashMap<String, ChallengeRecord>,
    ttl_ms: u64,
    last_cleanup: AtomicU64,
}

impl ChallengeStore {
    /// Creates a store verifying proofs against the given shared secret.
    pub fn new(shared_secret: impl Into<String>) -> Self {
        Self {
            shared_secret: shared_secret.into(),
            records: DashMap::new(),
            ttl_ms: CHALLENGE_TTL_MS,
            last_cleanup: AtomicU64::new(clock::now_ms()),
        }
    }

    /// Overrides the challenge lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Issues a fresh challenge, returning it with its expiry timestamp.
    pub fn create_challenge(&self, client_id: &str) -> (String, u64) {
        self.maybe_cleanup();
        let challenge = generate_challenge();
        let created_at = clock::now_ms();
        self.records.insert(
            challenge.clone(),
            ChallengeRecord {
                created_at,
                used: false,
            },
        );
        debug!("Issued challenge for client {}", client_id);
        (challenge, created_at + self.ttl_ms)
    }

    /// Verifies a proof for a filename against an outstanding challenge.
    ///
    /// Returns false for unknown, already-consumed, or expired challenges
    /// and for proof mismatches. A mismatch marks the challenge used so a
    /// second attempt with the correct proof still fails.
    pub fn verify_and_consume(&self, challenge: &str, filename: &str, proof: &str) -> bool {
        let (created_at, used) = match self.records.get(challenge) {
            Some(record) => (record.created_at, record.used),
            None => {
                debug!("Rejected key exchange: unknown challenge");
                return false;
            }
        };

        if used {
            self.records.remove(challenge);
            warn!("Rejected key exchange: challenge already consumed");
            return false;
        }

        if clock::now_ms().saturating_sub(created_at) > self.ttl_ms {
            self.records.remove(challenge);
            warn!("Rejected key exchange: challenge expired");
            return false;
        }

        if !verify_proof(&self.shared_secret, challenge, filename, proof) {
            if let Some(mut record) = self.records.get_mut(challenge) {
                record.used = true;
            }
            warn!("Rejected key exchange for {}: proof mismatch", filename);
            return false;
        }

        self.records.remove(challenge);
        debug!("Key exchange authorized for {}", filename);
        true
    }

    /// Removes expired and consumed challenges, returning how many went.
    pub fn cleanup(&self) -> usize {
        let now = clock::now_ms();
        let before = self.records.len();
        self.records
            .retain(|_, record| !record.used && now.saturating_sub(record.created_at) <= self.ttl_ms);
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            debug!("Cleaned up {} stale challenge(s)", removed);
        }
        removed
    }

    /// Number of outstanding challenges.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no challenges are outstanding.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn maybe_cleanup(&self) {
        let now = clock::now_ms();
        let last = self.last_cleanup.load(Ordering::Relaxed);
        if now.saturating_sub(last) >= CLEANUP_INTERVAL_MS {
            self.last_cleanup.store(now, Ordering::Relaxed);
            self.cleanup();
        }
    }
}
