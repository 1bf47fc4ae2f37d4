//! Version vectors and the causal order they induce.
//!
//! Stored as a `BTreeMap` rather than a `HashMap` for deterministic
//! iteration order, matching the reasoning behind `cargo`'s own
//! deterministic `Cargo.lock` encoding and the reference pack's
//! `fastnode::Lockfile` (`BTreeMap` chosen explicitly "for deterministic
//! ordering").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::machine::MachineId;

/// The causal relation between two version vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalRelation {
    Equal,
    Before,
    After,
    Concurrent,
}

impl CausalRelation {
    pub fn is_concurrent(&self) -> bool {
        matches!(self, CausalRelation::Concurrent)
    }
}

/// A mapping from machine id to a monotonic counter. Missing entries
/// read as `0`. Every mutating operation returns a new vector; the
/// argument is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionVector(BTreeMap<MachineId, u64>);

impl VersionVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Read the counter for `machine`, defaulting to `0` if absent.
    pub fn get(&self, machine: MachineId) -> u64 {
        self.0.get(&machine).copied().unwrap_or(0)
    }

    /// Return a new vector with `machine` set to `n`.
    pub fn set(&self, machine: MachineId, n: u64) -> Self {
        let mut next = self.0.clone();
        next.insert(machine, n);
        Self(next)
    }

    /// Return a new vector with `machine`'s counter incremented by one.
    pub fn increment(&self, machine: MachineId) -> Self {
        self.set(machine, self.get(machine) + 1)
    }

    /// Element-wise maximum over the union of keys. Commutative,
    /// associative, idempotent (see `tests::proptests` below).
    pub fn merge(&self, other: &Self) -> Self {
        let mut next = self.0.clone();
        for (&machine, &count) in &other.0 {
            let entry = next.entry(machine).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        Self(next)
    }

    /// Compare two vectors under the causal partial order.
    pub fn compare(&self, other: &Self) -> CausalRelation {
        let mut has_less = false;
        let mut has_more = false;

        for machine in self.0.keys().chain(other.0.keys()) {
            let a = self.get(*machine);
            let b = other.get(*machine);
            if a < b {
                has_less = true;
            } else if a > b {
                has_more = true;
            }
        }

        match (has_less, has_more) {
            (false, false) => CausalRelation::Equal,
            (true, false) => CausalRelation::Before,
            (false, true) => CausalRelation::After,
            (true, true) => CausalRelation::Concurrent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(machine, counter)` pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (MachineId, u64)> + '_ {
        self.0.iter().map(|(&m, &c)| (m, c))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = MachineId> + '_ {
        self.0.keys().copied()
    }
}

impl FromIterator<(MachineId, u64)> for VersionVector {
    fn from_iter<I: IntoIterator<Item = (MachineId, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
