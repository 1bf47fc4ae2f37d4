//! The `(modifier machine, vector at change)` stamp attached to each
//! package entry.

use serde::{Deserialize, Serialize};

use crate::machine::MachineId;
use crate::vector::VersionVector;

/// Records which machine last modified a package entry, and the version
/// vector at the time of that change.
///
/// The zero value (`modified_by` is the nil machine id, `vector_at_change`
/// is empty) means "no provenance recorded" and is legal: the system
/// degrades to timestamp-based tie-breaks when it sees one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub modified_by: MachineId,
    pub vector_at_change: VersionVector,
}

impl Provenance {
    pub fn new(modified_by: MachineId, vector_at_change: VersionVector) -> Self {
        Self {
            modified_by,
            vector_at_change,
        }
    }

    /// Whether this is the zero "no provenance recorded" sentinel.
    pub fn is_zero(&self) -> bool {
        !self.modified_by.is_valid() && self.vector_at_change.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        assert!(Provenance::default().is_zero());
    }

    #[test]
    fn stamped_is_not_zero() {
        let p = Provenance::new(MachineId::new(), VersionVector::new().increment(MachineId::new()));
        assert!(!p.is_zero());
    }
}
