//! Multi-machine lockfile synchronization: version-vector causality,
//! three-way conflict detection, pluggable resolution strategies, merge
//! application, and provenance.
//!
//! Out of scope (owned by callers): package providers, the CLI,
//! configuration loading, progress/telemetry output, and network
//! transport — sync runs over whatever substrate already shares the
//! lockfile file (typically a VCS).

mod conflict;
mod engine;
mod error;
mod lineage;
mod machine;
mod merger;
mod metadata;
mod package;
mod persistence;
mod provenance;
mod resolver;
mod state;
mod vector;

pub use conflict::{ConflictDetector, ConflictKind, DetectResult, LockConflict};
pub use engine::{
    compare_states, in_sync, is_ahead, is_behind, needs_merge, SyncEngine, SyncInput, SyncOptions,
    SyncResult, SyncStats,
};
pub use error::{MachineIdError, PersistError, SyncError};
pub use lineage::MachineLineage;
pub use machine::MachineId;
pub use merger::{LockfileMerger, MergeChange, MergeChangeKind, MergeResult};
pub use metadata::SyncMetadata;
pub use package::{PackageKey, PackageKeyParseError, PackageLockInfo};
pub use persistence::{FileLockfileRepository, LockfileRepository};
pub use provenance::Provenance;
pub use resolver::{resolve_manually, ConflictResolver, Resolution, ResolutionChoice, ResolutionStrategy};
pub use state::{LockfileState, StateError};
pub use vector::{CausalRelation, VersionVector};
