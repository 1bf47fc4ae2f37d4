//! The sync engine: orchestrates detection, auto-resolution, merged-state
//! construction, and the manual-conflict queue.

use std::collections::BTreeMap;

use crate::conflict::{ConflictDetector, ConflictKind, LockConflict};
use crate::error::SyncError;
use crate::machine::MachineId;
use crate::metadata::SyncMetadata;
use crate::package::PackageKey;
use crate::resolver::{resolve_manually, ConflictResolver, Resolution, ResolutionChoice, ResolutionStrategy};
use crate::state::LockfileState;
use crate::vector::CausalRelation;

/// `{resolver, machine_id, hostname}` — the engine's configuration.
/// `machine_id`/`hostname` are optional: when absent, a sync still
/// produces a merged state but does not stamp local activity into it.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub resolver: ResolutionStrategy,
    pub machine_id: Option<MachineId>,
    pub hostname: Option<String>,
}

impl SyncOptions {
    pub fn new(resolver: ResolutionStrategy) -> Self {
        Self {
            resolver,
            machine_id: None,
            hostname: None,
        }
    }

    pub fn with_machine(mut self, machine_id: MachineId, hostname: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id);
        self.hostname = Some(hostname.into());
        self
    }
}

/// The three states a sync consumes. `local`/`remote` are required;
/// `base` is the optional common ancestor for three-way merges.
#[derive(Debug, Clone, Copy)]
pub struct SyncInput<'a> {
    pub local: Option<&'a LockfileState>,
    pub remote: Option<&'a LockfileState>,
    pub base: Option<&'a LockfileState>,
}

/// `{unchanged, added, removed, updated, auto_resolved, manual}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub unchanged: u64,
    pub added: u64,
    pub removed: u64,
    pub updated: u64,
    pub auto_resolved: u64,
    pub manual: u64,
}

/// `{merged, resolutions, manual_conflicts, stats}`.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub merged: LockfileState,
    pub resolutions: Vec<Resolution>,
    pub manual_conflicts: Vec<LockConflict>,
    pub stats: SyncStats,
}

pub struct SyncEngine {
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    /// Run a sync. Rejects a null local or remote state; both are
    /// programmer errors, not expected-failure conditions.
    #[tracing::instrument(skip(self, input))]
    pub fn sync(&self, input: SyncInput<'_>) -> Result<SyncResult, SyncError> {
        let local = input.local.ok_or(SyncError::NullLocalState)?;
        let remote = input.remote.ok_or(SyncError::NullRemoteState)?;

        let detected = ConflictDetector::detect(
            &local.packages,
            &remote.packages,
            input.base.map(|b| &b.packages),
        );

        let all_conflicts: Vec<LockConflict> = detected
            .conflicts
            .iter()
            .chain(detected.auto_resolvable.iter())
            .cloned()
            .collect();
        let (resolved, manual_conflicts) = self.options.resolver.resolve_all(&all_conflicts);

        let mut merged_metadata = local
            .metadata
            .clone()
            .unwrap_or_default()
            .merge(&remote.metadata.clone().unwrap_or_default());
        if let Some(machine_id) = self.options.machine_id {
            let hostname = self.options.hostname.as_deref().unwrap_or("");
            merged_metadata = merged_metadata.record_activity(machine_id, hostname);
        }

        let mut merged_packages = local.packages.clone();
        let mut stats = SyncStats {
            unchanged: detected.clean.len() as u64,
            ..Default::default()
        };

        for resolution in &resolved {
            apply_resolution(&mut merged_packages, resolution, &mut stats);
        }
        stats.auto_resolved = resolved.len() as u64;
        stats.manual = manual_conflicts.len() as u64;
        tracing::debug!(
            unchanged = stats.unchanged,
            auto_resolved = stats.auto_resolved,
            manual = stats.manual,
            "sync completed"
        );

        Ok(SyncResult {
            merged: LockfileState {
                packages: merged_packages,
                metadata: Some(merged_metadata),
            },
            resolutions: resolved,
            manual_conflicts,
            stats,
        })
    }

    /// Alias for [`Self::sync`] with a common-ancestor base, for the
    /// caller-facing "three-way merge" framing.
    pub fn three_way_sync(
        &self,
        local: &LockfileState,
        remote: &LockfileState,
        base: &LockfileState,
    ) -> Result<SyncResult, SyncError> {
        self.sync(SyncInput {
            local: Some(local),
            remote: Some(remote),
            base: Some(base),
        })
    }

    /// Alias for [`Self::sync`] framed as "pull remote changes into local".
    pub fn pull(&self, local: &LockfileState, remote: &LockfileState) -> Result<SyncResult, SyncError> {
        self.sync(SyncInput {
            local: Some(local),
            remote: Some(remote),
            base: None,
        })
    }

    /// Alias for [`Self::sync`] framed as "push local changes out". The
    /// engine is direction-agnostic; `push` and `pull` differ only in the
    /// caller's intent, not in behavior.
    pub fn push(&self, local: &LockfileState, remote: &LockfileState) -> Result<SyncResult, SyncError> {
        self.sync(SyncInput {
            local: Some(local),
            remote: Some(remote),
            base: None,
        })
    }

    /// Locate `key` in the manual queue, resolve it with `choice`, and
    /// apply the result to `result.merged` in place.
    pub fn resolve_manual_conflict(
        &self,
        result: &mut SyncResult,
        key: &PackageKey,
        choice: ResolutionChoice,
    ) -> Result<(), SyncError> {
        let position = result
            .manual_conflicts
            .iter()
            .position(|c| &c.key == key)
            .ok_or_else(|| SyncError::ConflictNotFound(key.clone()))?;
        let conflict = result.manual_conflicts.remove(position);

        let resolution = resolve_manually(&conflict, choice);
        apply_resolution(&mut result.merged.packages, &resolution, &mut result.stats);
        result.resolutions.push(resolution);
        Ok(())
    }
}

fn apply_resolution(
    packages: &mut BTreeMap<PackageKey, crate::package::PackageLockInfo>,
    resolution: &Resolution,
    stats: &mut SyncStats,
) {
    if resolution.choice == ResolutionChoice::Skip {
        return;
    }
    match &resolution.result {
        None => {
            if packages.remove(&resolution.conflict.key).is_some() {
                stats.removed += 1;
            }
        }
        Some(info) => {
            let is_addition = matches!(
                resolution.conflict.kind,
                ConflictKind::LocalOnly | ConflictKind::RemoteOnly
            );
            packages.insert(resolution.conflict.key.clone(), info.clone());
            if is_addition {
                stats.added += 1;
            } else {
                stats.updated += 1;
            }
        }
    }
}

fn vector_of(state: &LockfileState) -> crate::vector::VersionVector {
    state
        .metadata
        .as_ref()
        .map(|m| m.vector.clone())
        .unwrap_or_default()
}

/// The causal relation of two states' metadata vectors. Null inputs (a
/// state that could not be loaded) compare as `Concurrent`, since "cannot
/// be compared" and "genuinely diverged" require the same caution from a
/// caller deciding whether to merge.
pub fn compare_states(local: Option<&LockfileState>, remote: Option<&LockfileState>) -> CausalRelation {
    match (local, remote) {
        (Some(local), Some(remote)) => vector_of(local).compare(&vector_of(remote)),
        _ => CausalRelation::Concurrent,
    }
}

pub fn is_ahead(local: Option<&LockfileState>, remote: Option<&LockfileState>) -> bool {
    compare_states(local, remote) == CausalRelation::After
}

pub fn is_behind(local: Option<&LockfileState>, remote: Option<&LockfileState>) -> bool {
    compare_states(local, remote) == CausalRelation::Before
}

pub fn in_sync(local: Option<&LockfileState>, remote: Option<&LockfileState>) -> bool {
    compare_states(local, remote) == CausalRelation::Equal
}

pub fn needs_merge(local: Option<&LockfileState>, remote: Option<&LockfileState>) -> bool {
    compare_states(local, remote).is_concurrent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageLockInfo;
    use crate::provenance::Provenance;
    use crate::vector::VersionVector;
    use time::OffsetDateTime;

    fn key(s: &str) -> PackageKey {
        s.parse().unwrap()
    }

    fn state_with(packages: &[(&str, &str)]) -> LockfileState {
        let mut state = LockfileState::new();
        for (k, version) in packages {
            state
                .add(key(k), PackageLockInfo::new(*version, OffsetDateTime::now_utc()))
                .unwrap();
        }
        state
    }

    #[test]
    fn sync_rejects_null_states() {
        let engine = SyncEngine::new(SyncOptions::new(ResolutionStrategy::Auto));
        let local = state_with(&[]);
        let err = engine
            .sync(SyncInput {
                local: None,
                remote: Some(&local),
                base: None,
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::NullLocalState));
    }

    #[test]
    fn local_only_addition_is_merged_and_counted() {
        let engine = SyncEngine::new(SyncOptions::new(ResolutionStrategy::Auto));
        let local = state_with(&[("brew:jq", "1.7")]);
        let remote = state_with(&[]);

        let result = engine.pull(&local, &remote).unwrap();
        assert!(result.merged.packages.contains_key(&key("brew:jq")));
        assert!(result.stats.added >= 1);
        assert!(result.manual_conflicts.is_empty());
    }

    #[test]
    fn concurrent_update_requires_manual_resolution() {
        let a = MachineId::new();
        let b = MachineId::new();
        let mut local = LockfileState::new();
        local
            .add(
                key("brew:ripgrep"),
                PackageLockInfo::new("14.0.0", OffsetDateTime::now_utc())
                    .with_provenance(Provenance::new(a, VersionVector::new().set(a, 1))),
            )
            .unwrap();
        let mut remote = LockfileState::new();
        remote
            .add(
                key("brew:ripgrep"),
                PackageLockInfo::new("14.1.0", OffsetDateTime::now_utc())
                    .with_provenance(Provenance::new(b, VersionVector::new().set(b, 1))),
            )
            .unwrap();

        let engine = SyncEngine::new(SyncOptions::new(ResolutionStrategy::Auto));
        let mut result = engine.pull(&local, &remote).unwrap();
        assert_eq!(result.manual_conflicts.len(), 1);

        engine
            .resolve_manual_conflict(&mut result, &key("brew:ripgrep"), ResolutionChoice::Remote)
            .unwrap();
        assert!(result.manual_conflicts.is_empty());
        assert_eq!(
            result.merged.packages.get(&key("brew:ripgrep")).unwrap().version,
            "14.1.0"
        );
        assert_eq!(result.stats.updated, 1);
    }

    #[test]
    fn resolve_manual_conflict_rejects_unknown_key() {
        let engine = SyncEngine::new(SyncOptions::new(ResolutionStrategy::Auto));
        let local = state_with(&[]);
        let remote = state_with(&[]);
        let mut result = engine.pull(&local, &remote).unwrap();

        let err = engine
            .resolve_manual_conflict(&mut result, &key("brew:jq"), ResolutionChoice::Skip)
            .unwrap_err();
        assert!(matches!(err, SyncError::ConflictNotFound(_)));
    }

    #[test]
    fn sync_is_deterministic_across_repeated_runs() {
        let a = MachineId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let b = MachineId::parse("660e8400-e29b-41d4-a716-446655440000").unwrap();

        let mut local = LockfileState::new();
        local
            .add(
                key("brew:ripgrep"),
                PackageLockInfo::new("14.0.0", OffsetDateTime::now_utc())
                    .with_provenance(Provenance::new(a, VersionVector::new().set(a, 1))),
            )
            .unwrap();
        local
            .add(key("brew:fd"), PackageLockInfo::new("9.0.0", OffsetDateTime::now_utc()))
            .unwrap();

        let mut remote = LockfileState::new();
        remote
            .add(
                key("brew:ripgrep"),
                PackageLockInfo::new("14.1.0", OffsetDateTime::now_utc())
                    .with_provenance(Provenance::new(a, VersionVector::new().set(a, 1).set(b, 1))),
            )
            .unwrap();
        remote
            .add(key("brew:jq"), PackageLockInfo::new("1.7", OffsetDateTime::now_utc()))
            .unwrap();

        // No `machine_id` configured, so `record_activity` never fires and
        // the only remaining source of wall-clock time is each entry's own
        // fixed `modified_at` — the engine has nothing left to vary between
        // two calls with the same input.
        let engine = SyncEngine::new(SyncOptions::new(ResolutionStrategy::Auto));
        let first = engine.pull(&local, &remote).unwrap();
        let second = engine.pull(&local, &remote).unwrap();

        assert_eq!(first.merged.packages, second.merged.packages);
        assert_eq!(
            first.merged.metadata.unwrap().vector,
            second.merged.metadata.unwrap().vector
        );
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn causal_predicates_match_vector_relation() {
        let a = MachineId::new();
        let b = MachineId::new();

        let mut ahead = LockfileState::new();
        ahead.metadata = Some(SyncMetadata::new(VersionVector::new().set(a, 2)));
        let mut behind = LockfileState::new();
        behind.metadata = Some(SyncMetadata::new(VersionVector::new().set(a, 1)));

        assert!(is_ahead(Some(&ahead), Some(&behind)));
        assert!(!is_behind(Some(&ahead), Some(&behind)));
        assert!(!needs_merge(Some(&ahead), Some(&behind)));

        let mut diverged_local = LockfileState::new();
        diverged_local.metadata = Some(SyncMetadata::new(VersionVector::new().set(a, 1)));
        let mut diverged_remote = LockfileState::new();
        diverged_remote.metadata = Some(SyncMetadata::new(VersionVector::new().set(b, 1)));

        assert!(needs_merge(Some(&diverged_local), Some(&diverged_remote)));
        assert_eq!(
            compare_states(Some(&diverged_local), Some(&diverged_remote)),
            CausalRelation::Concurrent
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_machine() -> impl Strategy<Value = MachineId> {
            prop_oneof![
                Just(MachineId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap()),
                Just(MachineId::parse("660e8400-e29b-41d4-a716-446655440000").unwrap()),
                Just(MachineId::parse("770e8400-e29b-41d4-a716-446655440000").unwrap()),
            ]
        }

        fn arb_key() -> impl Strategy<Value = PackageKey> {
            (0u8..4).prop_map(|i| format!("brew:pkg-{i}").parse().unwrap())
        }

        fn arb_vector() -> impl Strategy<Value = VersionVector> {
            proptest::collection::vec((arb_machine(), 0u64..5), 0..4)
                .prop_map(|entries| entries.into_iter().collect())
        }

        fn arb_version() -> impl Strategy<Value = &'static str> {
            prop_oneof![Just("1.0"), Just("1.1"), Just("2.0")]
        }

        fn arb_entry() -> impl Strategy<Value = PackageLockInfo> {
            (arb_machine(), 0u64..4, arb_version()).prop_map(|(machine, counter, version)| {
                PackageLockInfo::new(version, OffsetDateTime::now_utc())
                    .with_provenance(Provenance::new(machine, VersionVector::new().set(machine, counter)))
            })
        }

        fn arb_state() -> impl Strategy<Value = LockfileState> {
            (
                arb_vector(),
                proptest::collection::btree_map(arb_key(), proptest::option::of(arb_entry()), 0..6),
            )
                .prop_map(|(vector, entries)| {
                    let mut state = LockfileState::with_metadata(SyncMetadata::new(vector));
                    for (key, maybe_entry) in entries {
                        if let Some(entry) = maybe_entry {
                            state.add(key, entry).unwrap();
                        }
                    }
                    state
                })
        }

        proptest! {
            /// Invariant 3: the merged vector never loses ground against
            /// either input — it is never causally `Before` local's or
            /// remote's own vector.
            #[test]
            fn merged_vector_dominates_both_inputs(local in arb_state(), remote in arb_state()) {
                let engine = SyncEngine::new(SyncOptions::new(ResolutionStrategy::Auto));
                let result = engine.pull(&local, &remote).unwrap();
                let merged_vector = result.merged.metadata.unwrap().vector;
                let local_vector = local.metadata.unwrap_or_default().vector;
                let remote_vector = remote.metadata.unwrap_or_default().vector;

                prop_assert_ne!(merged_vector.compare(&local_vector), CausalRelation::Before);
                prop_assert_ne!(merged_vector.compare(&remote_vector), CausalRelation::Before);
            }

            /// Invariant 6: every conflict the detector tags auto-resolvable
            /// is in fact settled by `Auto` without escalating to manual.
            #[test]
            fn auto_resolvable_conflicts_never_escalate(local in arb_state(), remote in arb_state()) {
                let detected = ConflictDetector::detect(&local.packages, &remote.packages, None);
                for conflict in &detected.auto_resolvable {
                    let (resolution, needs_manual) = ResolutionStrategy::Auto.resolve(conflict);
                    prop_assert!(!needs_manual);
                    prop_assert!(resolution.is_some());
                }
            }

            /// Invariant 7: every package key touched by either side lands in
            /// exactly one of unchanged/auto-resolved/manual, and every
            /// auto-resolved key lands in exactly one of added/removed/updated.
            #[test]
            fn sync_conserves_every_package_key(local in arb_state(), remote in arb_state()) {
                let union_count = local
                    .packages
                    .keys()
                    .chain(remote.packages.keys())
                    .collect::<std::collections::BTreeSet<_>>()
                    .len() as u64;

                let engine = SyncEngine::new(SyncOptions::new(ResolutionStrategy::Auto));
                let result = engine.pull(&local, &remote).unwrap();

                prop_assert_eq!(
                    result.stats.unchanged + result.stats.auto_resolved + result.stats.manual,
                    union_count
                );
                prop_assert_eq!(
                    result.stats.added + result.stats.removed + result.stats.updated,
                    result.stats.auto_resolved
                );
            }
        }
    }
}
