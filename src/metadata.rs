//! Sync metadata: the version vector plus per-machine lineage for an
//! entire lockfile.
//!
//! §9 of the spec flags the "initialized" flag on this type as better
//! modeled as `Option<SyncMetadata>` at the lockfile level in a language
//! with sum types. Rust is exactly that language, so [`SyncMetadata`]
//! itself carries no such flag — [`crate::state::LockfileState::metadata`]
//! is the `Option` that distinguishes "v1 lockfile, no sync info" from a
//! legitimately empty-but-initialized metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::lineage::MachineLineage;
use crate::machine::MachineId;
use crate::vector::VersionVector;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub vector: VersionVector,
    pub lineage: BTreeMap<MachineId, MachineLineage>,
}

impl SyncMetadata {
    pub fn new(vector: VersionVector) -> Self {
        Self {
            vector,
            lineage: BTreeMap::new(),
        }
    }

    /// Element-wise merge of the vector and a union of lineage entries,
    /// keeping whichever side has the more recent `last_seen` per machine.
    pub fn merge(&self, other: &Self) -> Self {
        let vector = self.vector.merge(&other.vector);
        let mut lineage = self.lineage.clone();
        for (machine, entry) in &other.lineage {
            match lineage.get(machine) {
                Some(existing) if existing.last_seen >= entry.last_seen => {}
                _ => {
                    lineage.insert(*machine, entry.clone());
                }
            }
        }
        Self { vector, lineage }
    }

    /// Record activity from `machine`: increment its counter and refresh
    /// its lineage entry with the current time.
    pub fn record_activity(&self, machine: MachineId, hostname: impl Into<String>) -> Self {
        self.record_activity_at(machine, hostname, OffsetDateTime::now_utc())
    }

    /// As [`Self::record_activity`] but with an explicit timestamp, for
    /// deterministic tests.
    pub fn record_activity_at(
        &self,
        machine: MachineId,
        hostname: impl Into<String>,
        at: OffsetDateTime,
    ) -> Self {
        let vector = self.vector.increment(machine);
        let mut lineage = self.lineage.clone();
        lineage.insert(machine, MachineLineage::new(machine, hostname, at));
        Self { vector, lineage }
    }
}
