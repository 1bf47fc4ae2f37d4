//! Three-way conflict detection over two package maps (and an optional
//! common ancestor).

use std::collections::BTreeMap;

use crate::package::{PackageKey, PackageLockInfo};
use crate::vector::CausalRelation;

/// How a single package key differs between local and remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    VersionMismatch,
    LocalOnly,
    RemoteOnly,
    BothModified,
}

/// A single package key's conflicting state. Any of `local`/`remote`/`base`
/// may be absent — modeled as `Option` rather than a zero sentinel, per the
/// data model's Rust-native redesign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConflict {
    pub key: PackageKey,
    pub kind: ConflictKind,
    pub local: Option<PackageLockInfo>,
    pub remote: Option<PackageLockInfo>,
    pub base: Option<PackageLockInfo>,
}

impl LockConflict {
    /// Whether the resolver can settle this without a human: `LocalOnly`
    /// and `RemoteOnly` always; `VersionMismatch` always (worst case, the
    /// resolver falls back to a timestamp tiebreak); `BothModified` never
    /// — it is only ever assigned for a delete/modify pair or for
    /// concurrent provenance, both of which require a person.
    pub fn is_resolvable(&self) -> bool {
        match self.kind {
            ConflictKind::LocalOnly | ConflictKind::RemoteOnly => true,
            ConflictKind::BothModified => false,
            ConflictKind::VersionMismatch => true,
        }
    }
}

/// The three output buckets of conflict detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectResult {
    pub conflicts: Vec<LockConflict>,
    pub auto_resolvable: Vec<LockConflict>,
    pub clean: Vec<PackageKey>,
}

/// Stateless classifier; see the module doc comment for the algorithm.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn detect(
        local: &BTreeMap<PackageKey, PackageLockInfo>,
        remote: &BTreeMap<PackageKey, PackageLockInfo>,
        base: Option<&BTreeMap<PackageKey, PackageLockInfo>>,
    ) -> DetectResult {
        let mut result = DetectResult::default();

        let keys: std::collections::BTreeSet<&PackageKey> =
            local.keys().chain(remote.keys()).collect();

        for key in keys {
            let l = local.get(key);
            let r = remote.get(key);
            let b = base.and_then(|b| b.get(key));

            let conflict = match (l, r) {
                (Some(local_entry), None) => {
                    let kind = if b.is_some() {
                        ConflictKind::BothModified
                    } else {
                        ConflictKind::LocalOnly
                    };
                    Some(LockConflict {
                        key: key.clone(),
                        kind,
                        local: Some(local_entry.clone()),
                        remote: None,
                        base: b.cloned(),
                    })
                }
                (None, Some(remote_entry)) => {
                    let kind = if b.is_some() {
                        ConflictKind::BothModified
                    } else {
                        ConflictKind::RemoteOnly
                    };
                    Some(LockConflict {
                        key: key.clone(),
                        kind,
                        local: None,
                        remote: Some(remote_entry.clone()),
                        base: b.cloned(),
                    })
                }
                (Some(local_entry), Some(remote_entry)) => {
                    if local_entry.version == remote_entry.version {
                        result.clean.push(key.clone());
                        None
                    } else {
                        Some(classify_version_conflict(
                            key.clone(),
                            local_entry.clone(),
                            remote_entry.clone(),
                            b.cloned(),
                        ))
                    }
                }
                (None, None) => None,
            };

            if let Some(conflict) = conflict {
                if conflict.is_resolvable() {
                    result.auto_resolvable.push(conflict);
                } else {
                    result.conflicts.push(conflict);
                }
            }
        }

        result
    }
}

fn classify_version_conflict(
    key: PackageKey,
    local: PackageLockInfo,
    remote: PackageLockInfo,
    base: Option<PackageLockInfo>,
) -> LockConflict {
    let kind = if local.provenance.is_zero() || remote.provenance.is_zero() {
        ConflictKind::VersionMismatch
    } else {
        match local
            .provenance
            .vector_at_change
            .compare(&remote.provenance.vector_at_change)
        {
            CausalRelation::Before | CausalRelation::After | CausalRelation::Equal => {
                ConflictKind::VersionMismatch
            }
            CausalRelation::Concurrent => ConflictKind::BothModified,
        }
    };

    LockConflict {
        key,
        kind,
        local: Some(local),
        remote: Some(remote),
        base,
    }
}
