//! Change accounting: a thin facade over [`crate::engine::SyncEngine`] that
//! turns a `SyncResult` into an explicit, displayable list of changes.

use crate::conflict::{ConflictKind, LockConflict};
use crate::engine::{SyncResult, SyncStats};
use crate::machine::MachineId;
use crate::package::{PackageKey, PackageLockInfo};
use crate::provenance::Provenance;
use crate::resolver::{Resolution, ResolutionChoice};
use crate::state::LockfileState;
use crate::vector::VersionVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeChangeKind {
    Added,
    Removed,
    Updated,
    Kept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeChange {
    pub key: PackageKey,
    pub kind: MergeChangeKind,
    pub before: Option<PackageLockInfo>,
    pub after: Option<PackageLockInfo>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub merged: LockfileState,
    pub changes: Vec<MergeChange>,
    pub manual_conflicts: Vec<LockConflict>,
    pub stats: SyncStats,
}

pub struct LockfileMerger {
    machine_id: MachineId,
    hostname: String,
}

impl LockfileMerger {
    pub fn new(machine_id: MachineId, hostname: impl Into<String>) -> Self {
        Self {
            machine_id,
            hostname: hostname.into(),
        }
    }

    /// Turn a raw `SyncResult` into a change-accounted `MergeResult`.
    pub fn merge(&self, sync_result: &SyncResult) -> MergeResult {
        let changes = sync_result
            .resolutions
            .iter()
            .map(classify_resolution)
            .collect();
        MergeResult {
            merged: sync_result.merged.clone(),
            changes,
            manual_conflicts: sync_result.manual_conflicts.clone(),
            stats: sync_result.stats,
        }
    }

    /// Apply a manually-resolved `Resolution` to an in-progress
    /// `MergeResult`, recording the corresponding change.
    pub fn apply_resolution(&self, result: &mut MergeResult, resolution: Resolution) {
        let change = classify_resolution(&resolution);
        match resolution.choice {
            ResolutionChoice::Skip => {}
            _ => match &resolution.result {
                None => {
                    result.merged.packages.remove(&resolution.conflict.key);
                }
                Some(info) => {
                    result
                        .merged
                        .packages
                        .insert(resolution.conflict.key.clone(), info.clone());
                }
            },
        }
        result.changes.push(change);
    }

    /// Key-by-key diff of two package maps, for display.
    pub fn diff(&self, before: &LockfileState, after: &LockfileState) -> Vec<MergeChange> {
        let keys: std::collections::BTreeSet<&PackageKey> = before
            .packages
            .keys()
            .chain(after.packages.keys())
            .collect();

        keys.into_iter()
            .map(|key| {
                let before_entry = before.packages.get(key).cloned();
                let after_entry = after.packages.get(key).cloned();
                let kind = match (&before_entry, &after_entry) {
                    (None, Some(_)) => MergeChangeKind::Added,
                    (Some(_), None) => MergeChangeKind::Removed,
                    (Some(b), Some(a)) if b == a => MergeChangeKind::Kept,
                    _ => MergeChangeKind::Updated,
                };
                MergeChange {
                    key: key.clone(),
                    kind,
                    before: before_entry,
                    after: after_entry,
                    reason: "diff".to_string(),
                }
            })
            .collect()
    }

    /// Increment the local machine's counter and refresh its lineage
    /// immediately before persisting.
    pub fn prepare_for_commit(&self, state: &LockfileState) -> LockfileState {
        state.prepare_for_commit(self.machine_id, self.hostname.clone())
    }

    /// Stamp a locally-edited entry with this merger's machine id and the
    /// given vector, before it enters a state.
    pub fn update_provenance(&self, entry: PackageLockInfo, vector: VersionVector) -> PackageLockInfo {
        entry.with_provenance(Provenance::new(self.machine_id, vector))
    }
}

fn classify_resolution(resolution: &Resolution) -> MergeChange {
    // `LocalOnly`/`RemoteOnly` are additions by definition — nothing existed
    // on the other side for the package to have diverged from — so "before"
    // reads as absent even though `conflict.local` may already hold a value.
    let is_addition = matches!(
        resolution.conflict.kind,
        ConflictKind::LocalOnly | ConflictKind::RemoteOnly
    );
    let before = if is_addition {
        None
    } else {
        resolution.conflict.local.clone()
    };

    if resolution.choice == ResolutionChoice::Skip {
        return MergeChange {
            key: resolution.conflict.key.clone(),
            kind: MergeChangeKind::Kept,
            after: before.clone(),
            before,
            reason: resolution.reason.clone(),
        };
    }

    let kind = match (&before, &resolution.result) {
        (_, None) => MergeChangeKind::Removed,
        (None, Some(_)) => MergeChangeKind::Added,
        (Some(_), Some(_)) => MergeChangeKind::Updated,
    };

    MergeChange {
        key: resolution.conflict.key.clone(),
        kind,
        before,
        after: resolution.result.clone(),
        reason: resolution.reason.clone(),
    }
}
