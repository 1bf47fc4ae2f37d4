//! Human-oriented history of which machines have touched the lockfile.
//! Never consulted for causality — see [`crate::vector::VersionVector`]
//! for that.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::machine::MachineId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineLineage {
    pub machine_id: MachineId,
    pub hostname: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

impl MachineLineage {
    pub fn new(machine_id: MachineId, hostname: impl Into<String>, last_seen: OffsetDateTime) -> Self {
        Self {
            machine_id,
            hostname: hostname.into(),
            last_seen,
        }
    }
}
