//! Conflict resolution strategies: pure functions from a [`LockConflict`]
//! to a resolution (or an escalation to manual).

use crate::conflict::{ConflictKind, LockConflict};
use crate::package::PackageLockInfo;
use crate::vector::CausalRelation;

/// Which side a resolution picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionChoice {
    Local,
    Remote,
    Base,
    Skip,
}

/// The outcome of resolving one conflict.
///
/// `result` is `None` when the resolution deletes the package, *unless*
/// `choice == Skip`, in which case the package is kept as-is (the engine
/// reads the local entry directly in that case rather than through
/// `result`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub conflict: LockConflict,
    pub choice: ResolutionChoice,
    pub result: Option<PackageLockInfo>,
    pub reason: String,
}

/// A pluggable policy converting conflicts into resolutions.
pub trait ConflictResolver {
    /// Resolve a single conflict. Returns `(None, true)` to escalate to
    /// manual; otherwise `(Some(resolution), false)`.
    fn resolve(&self, conflict: &LockConflict) -> (Option<Resolution>, bool);

    /// Partition a batch into auto-resolved and still-manual.
    fn resolve_all(&self, conflicts: &[LockConflict]) -> (Vec<Resolution>, Vec<LockConflict>) {
        let mut resolved = Vec::new();
        let mut manual = Vec::new();
        for conflict in conflicts {
            match self.resolve(conflict) {
                (Some(resolution), false) => resolved.push(resolution),
                _ => manual.push(conflict.clone()),
            }
        }
        (resolved, manual)
    }
}

/// The five strategies named in the external interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    Manual,
    LocalWins,
    RemoteWins,
    Newest,
    Auto,
}

impl ConflictResolver for ResolutionStrategy {
    fn resolve(&self, conflict: &LockConflict) -> (Option<Resolution>, bool) {
        match self {
            ResolutionStrategy::Manual => (None, true),
            ResolutionStrategy::LocalWins => (Some(pick_local(conflict, "local-wins policy")), false),
            ResolutionStrategy::RemoteWins => {
                (Some(pick_remote(conflict, "remote-wins policy")), false)
            }
            ResolutionStrategy::Newest => resolve_newest(conflict),
            ResolutionStrategy::Auto => resolve_auto(conflict),
        }
    }
}

fn pick_local(conflict: &LockConflict, reason: &str) -> Resolution {
    Resolution {
        conflict: conflict.clone(),
        choice: ResolutionChoice::Local,
        result: conflict.local.clone(),
        reason: reason.to_string(),
    }
}

fn pick_remote(conflict: &LockConflict, reason: &str) -> Resolution {
    Resolution {
        conflict: conflict.clone(),
        choice: ResolutionChoice::Remote,
        result: conflict.remote.clone(),
        reason: reason.to_string(),
    }
}

/// Shared by `Newest` and `Auto`'s `VersionMismatch`/`BothModified` branches.
/// Causal order settles it when both sides have provenance: `After`/`Before`
/// pick a side outright, `Equal` falls through to a timestamp tiebreak, and
/// `Concurrent` escalates immediately — concurrent provenance is exactly
/// the case a version vector cannot order, so no timestamp should paper
/// over it. With no provenance on either side, compare timestamps directly;
/// a tie (or a delete/modify pair) escalates.
fn resolve_by_recency(conflict: &LockConflict) -> (Option<Resolution>, bool) {
    let (Some(local), Some(remote)) = (&conflict.local, &conflict.remote) else {
        return (None, true);
    };

    if !local.provenance.is_zero() && !remote.provenance.is_zero() {
        match local
            .provenance
            .vector_at_change
            .compare(&remote.provenance.vector_at_change)
        {
            CausalRelation::After => {
                return (Some(pick_local(conflict, "happened-after remote")), false)
            }
            CausalRelation::Before => {
                return (Some(pick_remote(conflict, "happened-after local")), false)
            }
            CausalRelation::Concurrent => return (None, true),
            CausalRelation::Equal => {}
        }
    }

    if local.modified_at > remote.modified_at {
        (Some(pick_local(conflict, "newer timestamp")), false)
    } else if remote.modified_at > local.modified_at {
        (Some(pick_remote(conflict, "newer timestamp")), false)
    } else {
        (None, true)
    }
}

fn resolve_newest(conflict: &LockConflict) -> (Option<Resolution>, bool) {
    resolve_by_recency(conflict)
}

fn resolve_auto(conflict: &LockConflict) -> (Option<Resolution>, bool) {
    match conflict.kind {
        ConflictKind::LocalOnly => (Some(pick_local(conflict, "local addition")), false),
        ConflictKind::RemoteOnly => (Some(pick_remote(conflict, "remote addition")), false),
        ConflictKind::VersionMismatch => resolve_by_recency(conflict),
        // TODO: a true three-way merge of the version string could live
        // here instead of falling through to recency, using `base` to
        // prefer whichever side actually diverged from it.
        ConflictKind::BothModified => {
            if conflict.local.is_none() || conflict.remote.is_none() {
                (None, true)
            } else {
                resolve_by_recency(conflict)
            }
        }
    }
}

/// Resolve a conflict with an explicit human choice. Used by
/// `SyncEngine::resolve_manual_conflict`.
pub fn resolve_manually(conflict: &LockConflict, choice: ResolutionChoice) -> Resolution {
    let result = match choice {
        ResolutionChoice::Local => conflict.local.clone(),
        ResolutionChoice::Remote => conflict.remote.clone(),
        ResolutionChoice::Base => conflict.base.clone(),
        ResolutionChoice::Skip => None,
    };
    Resolution {
        conflict: conflict.clone(),
        choice,
        result,
        reason: "manual resolution".to_string(),
    }
}
