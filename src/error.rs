//! Error taxonomy for the sync engine, grounded in `moss::client::sync::Error`
//! (reference pack) and `cargo`'s convention of a closed `thiserror` enum per
//! module boundary rather than a single crate-wide error type.

use crate::package::PackageKey;
use thiserror::Error;

/// Errors produced while parsing, validating, or bootstrapping a [`crate::machine::MachineId`].
#[derive(Debug, Error)]
pub enum MachineIdError {
    #[error("`{0}` is not a valid v4 UUID")]
    InvalidMachineId(String),

    #[error("machine id file not found at {0}")]
    MachineIdNotFound(std::path::PathBuf),

    #[error("failed to read machine id file at {path}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the [`crate::engine::SyncEngine`].
///
/// `NullLocalState` / `NullRemoteState` and `ConflictNotFound` are
/// programmer errors at the engine boundary (§7): the engine never
/// retries them and a caller hitting one has a bug to fix, not a
/// divergence to resolve.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync called with a null local state")]
    NullLocalState,

    #[error("sync called with a null remote state")]
    NullRemoteState,

    #[error("conflict for package `{0}` is not in the manual resolution queue")]
    ConflictNotFound(PackageKey),
}

/// Errors raised while loading or saving a lockfile document through a
/// [`crate::persistence::LockfileRepository`].
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("lockfile not found at {0}")]
    NotFound(std::path::PathBuf),

    #[error("lockfile at {path} is corrupt")]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: Box<PersistError>,
    },

    #[error("invalid package key `{0}`")]
    InvalidPackageKey(String),

    #[error("invalid integrity string `{0}` (expected `algo:hex`)")]
    InvalidIntegrity(String),

    #[error("unsupported lockfile schema version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid machine id in document")]
    InvalidMachineId(#[from] MachineIdError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
