//! The unit of sync: a lockfile's packages plus its sync metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::machine::MachineId;
use crate::metadata::SyncMetadata;
use crate::package::{PackageKey, PackageLockInfo};

/// Adding a duplicate key, or updating/removing one that doesn't exist.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("package `{0}` already exists")]
    AlreadyExists(PackageKey),
    #[error("package `{0}` does not exist")]
    NotFound(PackageKey),
}

/// `{packages, metadata}`. `metadata` is `None` for a v1 lockfile with
/// no sync info recorded yet — see [`crate::metadata::SyncMetadata`]'s
/// doc comment for why the `initialized` flag from the spec lives here
/// instead of on the metadata value itself.
///
/// Every operation here returns a new value except [`Self::add`],
/// [`Self::update`], and [`Self::remove`], which mutate the package map
/// in place — the one in-place-mutation aggregate named in §5.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileState {
    pub packages: BTreeMap<PackageKey, PackageLockInfo>,
    pub metadata: Option<SyncMetadata>,
}

impl LockfileState {
    pub fn new() -> Self {
        Self {
            packages: BTreeMap::new(),
            metadata: None,
        }
    }

    pub fn with_metadata(metadata: SyncMetadata) -> Self {
        Self {
            packages: BTreeMap::new(),
            metadata: Some(metadata),
        }
    }

    /// Add a new package entry. Fails if the key is already present.
    pub fn add(&mut self, key: PackageKey, entry: PackageLockInfo) -> Result<(), StateError> {
        if self.packages.contains_key(&key) {
            return Err(StateError::AlreadyExists(key));
        }
        self.packages.insert(key, entry);
        Ok(())
    }

    /// Replace an existing package entry. Fails if the key is absent.
    pub fn update(&mut self, key: &PackageKey, entry: PackageLockInfo) -> Result<(), StateError> {
        if !self.packages.contains_key(key) {
            return Err(StateError::NotFound(key.clone()));
        }
        self.packages.insert(key.clone(), entry);
        Ok(())
    }

    /// Remove a package entry. Fails if the key is absent.
    pub fn remove(&mut self, key: &PackageKey) -> Result<PackageLockInfo, StateError> {
        self.packages
            .remove(key)
            .ok_or_else(|| StateError::NotFound(key.clone()))
    }

    /// Increment `machine`'s counter and refresh its lineage entry
    /// immediately prior to persisting, per §4.4's commit preparation.
    /// Returns a fresh state; does not mutate `self`.
    pub fn prepare_for_commit(&self, machine: MachineId, hostname: impl Into<String>) -> Self {
        let metadata = self
            .metadata
            .clone()
            .unwrap_or_else(|| SyncMetadata::new(Default::default()))
            .record_activity(machine, hostname);
        Self {
            packages: self.packages.clone(),
            metadata: Some(metadata),
        }
    }
}
