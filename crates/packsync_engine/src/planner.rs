//! Sync planning.
//!
//! Joins the remote manifest against the local inventory and classifies
//! every remote pack as install, update or up-to-date. UUID is the join
//! key when both sides have one, so a server-side rename is still seen
//! as an update rather than a new file plus an orphan; packs without a
//! UUID fall back to filename matching.
//!
//! Manual packs always win: a remote pack whose UUID collides with a
//! manually installed pack is recorded as a conflict and never
//! downloaded, and manual files are never scheduled for update or purge.

use crate::scanner::LocalPackRecord;
use packsync_crypto::hashes_match;
use packsync_protocol::{RemoteManifest, RemotePackDescriptor};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A remote pack shadowed by a manually installed pack with the same UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConflict {
    /// Name of the remote pack that was skipped.
    pub remote_name: String,
    /// UUID shared by both sides.
    pub remote_uuid: Uuid,
    /// Filename of the local pack that wins.
    pub local_name: String,
    /// Whether the winning local pack is manual. Always true today.
    pub local_is_manual: bool,
}

/// Output of a comparison run: what to fetch, keep and remove.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncPlan {
    /// Remote packs with no local counterpart.
    pub to_install: Vec<RemotePackDescriptor>,
    /// Remote packs whose local synced copy has a different hash.
    pub to_update: Vec<RemotePackDescriptor>,
    /// Remote pack names already satisfied locally.
    pub up_to_date: Vec<String>,
    /// Synced filenames no longer listed by the server.
    pub orphaned: Vec<String>,
    /// Orphans scheduled for deletion. Empty unless auto-cleanup is on.
    pub to_purge: Vec<String>,
    /// Remote packs shadowed by manual copies.
    pub identity_conflicts: Vec<IdentityConflict>,
}

impl SyncPlan {
    /// Packs to download, installs first then updates.
    pub fn downloads(&self) -> Vec<RemotePackDescriptor> {
        self.to_install
            .iter()
            .chain(self.to_update.iter())
            .cloned()
            .collect()
    }

    /// Number of files the download phase would fetch.
    pub fn total_to_download(&self) -> usize {
        self.to_install.len() + self.to_update.len()
    }

    /// Declared size of all downloads, in bytes.
    pub fn total_download_bytes(&self) -> u64 {
        self.to_install
            .iter()
            .chain(self.to_update.iter())
            .map(|p| p.size)
            .sum()
    }

    /// True when the download phase has work to do.
    pub fn has_downloads(&self) -> bool {
        self.total_to_download() > 0
    }

    /// True when nothing needs downloading or purging.
    pub fn is_settled(&self) -> bool {
        !self.has_downloads() && self.to_purge.is_empty()
    }
}

/// Compares local inventory against a remote manifest.
#[derive(Debug, Clone, Copy)]
pub struct PackComparator {
    auto_cleanup: bool,
}

impl PackComparator {
    /// Creates a comparator; `auto_cleanup` moves orphans into the purge list.
    pub fn new(auto_cleanup: bool) -> Self {
        Self { auto_cleanup }
    }

    /// Builds a [`SyncPlan`] from the manifest and local records.
    ///
    /// Never fails: unmatched or odd inputs degrade to conservative
    /// classifications, not errors.
    pub fn compare(&self, manifest: &RemoteManifest, local: &[LocalPackRecord]) -> SyncPlan {
        debug!(
            "Comparing {} remote packs against {} local packs",
            manifest.packs.len(),
            local.len()
        );

        let mut manual_by_uuid: HashMap<Uuid, &LocalPackRecord> = HashMap::new();
        let mut synced_by_uuid: HashMap<Uuid, &LocalPackRecord> = HashMap::new();
        let mut by_filename: HashMap<&str, &LocalPackRecord> = HashMap::new();

        for record in local {
            by_filename.insert(record.filename.as_str(), record);
            if let Some(uuid) = record.uuid {
                if record.is_manual() {
                    manual_by_uuid.insert(uuid, record);
                } else {
                    synced_by_uuid.insert(uuid, record);
                }
            }
        }

        let mut plan = SyncPlan::default();

        for remote in &manifest.packs {
            match remote.uuid {
                Some(uuid) => {
                    if let Some(manual) = manual_by_uuid.get(&uuid) {
                        warn!(
                            "Manual pack {} shadows remote pack {} (uuid {})",
                            manual.filename, remote.name, uuid
                        );
                        plan.identity_conflicts.push(IdentityConflict {
                            remote_name: remote.name.clone(),
                            remote_uuid: uuid,
                            local_name: manual.filename.clone(),
                            local_is_manual: true,
                        });
                        continue;
                    }
                    if let Some(synced) = synced_by_uuid.get(&uuid) {
                        if hashes_match(&synced.content_hash, &remote.md5) {
                            plan.up_to_date.push(remote.name.clone());
                        } else {
                            debug!("Update by uuid: {} ({})", remote.name, uuid);
                            plan.to_update.push(remote.clone());
                        }
                        continue;
                    }
                    debug!("Install by uuid: {} ({})", remote.name, uuid);
                    plan.to_install.push(remote.clone());
                }
                None => match by_filename.get(remote.name.as_str()) {
                    Some(local) if local.is_manual() => {
                        // Manual copies are never overwritten, even on
                        // a hash mismatch.
                        plan.up_to_date.push(remote.name.clone());
                    }
                    Some(local) => {
                        if hashes_match(&local.content_hash, &remote.md5) {
                            plan.up_to_date.push(remote.name.clone());
                        } else {
                            debug!("Update by filename: {}", remote.name);
                            plan.to_update.push(remote.clone());
                        }
                    }
                    None => {
                        debug!("Install by filename: {}", remote.name);
                        plan.to_install.push(remote.clone());
                    }
                },
            }
        }

        let remote_uuids: HashSet<Uuid> = manifest.packs.iter().filter_map(|p| p.uuid).collect();
        let remote_names: HashSet<&str> =
            manifest.packs.iter().map(|p| p.name.as_str()).collect();

        for record in local.iter().filter(|r| !r.is_manual()) {
            let listed = match record.uuid {
                Some(uuid) => remote_uuids.contains(&uuid),
                None => remote_names.contains(record.filename.as_str()),
            };
            if !listed {
                plan.orphaned.push(record.filename.clone());
            }
        }

        if self.auto_cleanup {
            plan.to_purge = plan.orphaned.clone();
        } else if !plan.orphaned.is_empty() {
            info!(
                "Auto-cleanup disabled, keeping {} orphaned packs",
                plan.orphaned.len()
            );
        }

        info!(
            "Plan: install={}, update={}, up_to_date={}, orphaned={}, conflicts={}",
            plan.to_install.len(),
            plan.to_update.len(),
            plan.up_to_date.len(),
            plan.orphaned.len(),
            plan.identity_conflicts.len()
        );

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::SourceKind;
    use proptest::prelude::*;

    fn local(filename: &str, uuid: Option<Uuid>, hash: &str, source: SourceKind) -> LocalPackRecord {
        LocalPackRecord {
            filename: filename.to_string(),
            uuid,
            version: None,
            content_hash: hash.to_string(),
            size_bytes: 10,
            source,
        }
    }

    fn remote(name: &str, uuid: Option<Uuid>, md5: &str) -> RemotePackDescriptor {
        let mut pack = RemotePackDescriptor::new(name, md5, 10);
        if let Some(uuid) = uuid {
            pack = pack.with_identity(uuid, "1.0.0");
        }
        pack
    }

    fn manifest(packs: Vec<RemotePackDescriptor>) -> RemoteManifest {
        RemoteManifest::new(1_000, packs)
    }

    #[test]
    fn manual_conflict_and_synced_update() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let manifest = manifest(vec![
            remote("a.zip", Some(u1), "h1"),
            remote("b.zip", Some(u2), "h2"),
        ]);
        let local = vec![
            local("custom-a.zip", Some(u1), "whatever", SourceKind::Manual),
            local("b.zip", Some(u2), "h2-old", SourceKind::Synced),
        ];

        let plan = PackComparator::new(true).compare(&manifest, &local);

        assert_eq!(plan.identity_conflicts.len(), 1);
        let conflict = &plan.identity_conflicts[0];
        assert_eq!(conflict.remote_name, "a.zip");
        assert_eq!(conflict.remote_uuid, u1);
        assert_eq!(conflict.local_name, "custom-a.zip");
        assert!(conflict.local_is_manual);

        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].name, "b.zip");
        assert!(plan.to_install.is_empty());
        assert!(plan.up_to_date.is_empty());
    }

    #[test]
    fn fresh_install_downloads_everything() {
        let manifest = manifest(vec![
            remote("a.zip", Some(Uuid::new_v4()), "h1"),
            remote("b.zip", None, "h2"),
        ]);

        let plan = PackComparator::new(true).compare(&manifest, &[]);

        assert_eq!(plan.to_install.len(), 2);
        assert!(plan.has_downloads());
        assert_eq!(plan.total_download_bytes(), 20);
    }

    #[test]
    fn hash_match_is_case_insensitive() {
        let uuid = Uuid::new_v4();
        let manifest = manifest(vec![remote("a.zip", Some(uuid), "ABCDEF")]);
        let local = vec![local("a.zip", Some(uuid), "abcdef", SourceKind::Synced)];

        let plan = PackComparator::new(true).compare(&manifest, &local);

        assert_eq!(plan.up_to_date, vec!["a.zip".to_string()]);
        assert!(plan.is_settled());
    }

    #[test]
    fn rename_on_server_is_an_update() {
        let uuid = Uuid::new_v4();
        let manifest = manifest(vec![remote("renamed.zip", Some(uuid), "h-new")]);
        let local = vec![local("original.zip", Some(uuid), "h-old", SourceKind::Synced)];

        let plan = PackComparator::new(false).compare(&manifest, &local);

        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].name, "renamed.zip");
        assert!(plan.to_install.is_empty());
        assert!(plan.orphaned.is_empty());
    }

    #[test]
    fn filename_fallback_never_updates_manual_packs() {
        let manifest = manifest(vec![remote("a.zip", None, "h-new")]);
        let local = vec![local("a.zip", None, "h-old", SourceKind::Manual)];

        let plan = PackComparator::new(true).compare(&manifest, &local);

        assert!(plan.to_update.is_empty());
        assert_eq!(plan.up_to_date, vec!["a.zip".to_string()]);
    }

    #[test]
    fn filename_fallback_updates_synced_packs() {
        let manifest = manifest(vec![remote("a.zip", None, "h-new")]);
        let local = vec![local("a.zip", None, "h-old", SourceKind::Synced)];

        let plan = PackComparator::new(true).compare(&manifest, &local);

        assert_eq!(plan.to_update.len(), 1);
    }

    #[test]
    fn conflict_wins_even_when_hashes_agree() {
        let uuid = Uuid::new_v4();
        let manifest = manifest(vec![remote("a.zip", Some(uuid), "same")]);
        let local = vec![
            local("a.zip", Some(uuid), "same", SourceKind::Manual),
            local("a.zip", Some(uuid), "same", SourceKind::Synced),
        ];

        let plan = PackComparator::new(true).compare(&manifest, &local);

        assert_eq!(plan.identity_conflicts.len(), 1);
        assert!(plan.up_to_date.is_empty());
    }

    #[test]
    fn orphan_cleanup_toggle() {
        let manifest = manifest(vec![]);
        let local = vec![local("gone.zip", None, "h", SourceKind::Synced)];

        let kept = PackComparator::new(false).compare(&manifest, &local);
        assert_eq!(kept.orphaned, vec!["gone.zip".to_string()]);
        assert!(kept.to_purge.is_empty());

        let purged = PackComparator::new(true).compare(&manifest, &local);
        assert_eq!(purged.orphaned, vec!["gone.zip".to_string()]);
        assert_eq!(purged.to_purge, vec!["gone.zip".to_string()]);
    }

    #[test]
    fn manual_orphans_are_never_reported() {
        let manifest = manifest(vec![]);
        let local = vec![local("mine.zip", None, "h", SourceKind::Manual)];

        let plan = PackComparator::new(true).compare(&manifest, &local);

        assert!(plan.orphaned.is_empty());
        assert!(plan.to_purge.is_empty());
    }

    #[test]
    fn replanning_unchanged_state_is_identical() {
        let uuid = Uuid::new_v4();
        let manifest = manifest(vec![
            remote("a.zip", Some(uuid), "h1"),
            remote("b.zip", None, "h2"),
        ]);
        let local = vec![local("a.zip", Some(uuid), "h1", SourceKind::Synced)];

        let comparator = PackComparator::new(true);
        let first = comparator.compare(&manifest, &local);
        let second = comparator.compare(&manifest, &local);

        assert_eq!(first, second);
    }

    prop_compose! {
        fn arb_local()(
            n in 0u8..6,
            has_uuid in any::<bool>(),
            manual in any::<bool>(),
            hash in "[a-f0-9]{8}",
        ) -> LocalPackRecord {
            local(
                &format!("pack-{n}.zip"),
                has_uuid.then(|| Uuid::from_u128(u128::from(n) + 1)),
                &hash,
                if manual { SourceKind::Manual } else { SourceKind::Synced },
            )
        }
    }

    prop_compose! {
        fn arb_remote()(
            n in 0u8..6,
            has_uuid in any::<bool>(),
            md5 in "[a-f0-9]{8}",
        ) -> RemotePackDescriptor {
            remote(
                &format!("pack-{n}.zip"),
                has_uuid.then(|| Uuid::from_u128(u128::from(n) + 1)),
                &md5,
            )
        }
    }

    proptest! {
        // Every remote descriptor lands in exactly one bucket, and
        // manual files never end up scheduled for download or purge.
        #[test]
        fn partition_invariant(
            remotes in prop::collection::vec(arb_remote(), 0..6),
            locals in prop::collection::vec(arb_local(), 0..6),
            auto_cleanup in any::<bool>(),
        ) {
            // Dedupe inputs the way real directories and manifests are
            // unique by filename.
            let mut seen = HashSet::new();
            let remotes: Vec<_> = remotes
                .into_iter()
                .filter(|r| seen.insert(r.name.clone()))
                .collect();
            let mut seen = HashSet::new();
            let locals: Vec<_> = locals
                .into_iter()
                .filter(|l| seen.insert(l.filename.clone()))
                .collect();

            let plan = PackComparator::new(auto_cleanup)
                .compare(&manifest(remotes.clone()), &locals);

            for r in &remotes {
                let buckets = usize::from(plan.to_install.iter().any(|p| p.name == r.name))
                    + usize::from(plan.to_update.iter().any(|p| p.name == r.name))
                    + usize::from(plan.up_to_date.contains(&r.name))
                    + usize::from(plan.identity_conflicts.iter().any(|c| c.remote_name == r.name));
                prop_assert_eq!(buckets, 1, "pack {} not in exactly one bucket", r.name);
            }

            let manual_names: HashSet<_> = locals
                .iter()
                .filter(|l| l.is_manual())
                .map(|l| l.filename.clone())
                .collect();
            for name in &plan.to_purge {
                prop_assert!(!manual_names.contains(name));
            }
            for pack in plan.to_install.iter().chain(plan.to_update.iter()) {
                let shadowed = locals.iter().any(|l| {
                    l.is_manual()
                        && match pack.uuid {
                            Some(uuid) => l.uuid == Some(uuid),
                            None => l.filename == pack.name,
                        }
                });
                prop_assert!(!shadowed, "manual pack shadowed by {}", pack.name);
            }
        }
    }
}
