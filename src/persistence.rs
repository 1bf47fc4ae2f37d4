//! The v2 on-disk lockfile document and its repository.
//!
//! Grounded in the reference pack's `fastnode::Lockfile` (`read_from`/
//! `write_to`, schema-version check) and `tether-cli`'s atomic-write
//! helper: write to a temp file in the target directory, then rename.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::PersistError;
use crate::lineage::MachineLineage;
use crate::machine::MachineId;
use crate::metadata::SyncMetadata;
use crate::package::{PackageKey, PackageLockInfo};
use crate::provenance::Provenance;
use crate::state::LockfileState;
use crate::vector::VersionVector;

const SCHEMA_VERSION: u32 = 2;

/// `load`/`save`/`exists` — the persistence boundary the engine never
/// touches directly.
pub trait LockfileRepository {
    fn load(&self, path: &Path) -> Result<LockfileState, PersistError>;
    fn save(&self, path: &Path, state: &LockfileState) -> Result<(), PersistError>;
    fn exists(&self, path: &Path) -> bool;
}

/// Reads/writes the v2 JSON document at a filesystem path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLockfileRepository;

impl FileLockfileRepository {
    pub fn new() -> Self {
        Self
    }
}

impl LockfileRepository for FileLockfileRepository {
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    fn load(&self, path: &Path) -> Result<LockfileState, PersistError> {
        if !path.exists() {
            return Err(PersistError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let document: DocumentV2 = serde_json::from_str(&contents).map_err(|source| {
            PersistError::Corrupt {
                path: path.to_path_buf(),
                source: Box::new(PersistError::Json(source)),
            }
        })?;
        if document.version != SCHEMA_VERSION {
            return Err(PersistError::UnsupportedVersion(document.version));
        }
        let state = document_to_state(document).map_err(|source| PersistError::Corrupt {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        tracing::debug!(packages = state.packages.len(), "loaded lockfile");
        Ok(state)
    }

    #[tracing::instrument(skip(self, state), fields(path = %path.display()))]
    fn save(&self, path: &Path, state: &LockfileState) -> Result<(), PersistError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o755));
        }

        let document = state_to_document(state);
        let json = serde_json::to_string_pretty(&document)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644));
        }
        tmp.persist(path)
            .map_err(|persist_err| PersistError::Io(persist_err.error))?;
        tracing::info!(packages = state.packages.len(), "saved lockfile");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentV2 {
    version: u32,
    mode: String,
    machine_info: MachineInfoWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<SyncWire>,
    packages: BTreeMap<String, PackageWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MachineInfoWire {
    os: String,
    arch: String,
    hostname: String,
    #[serde(with = "time::serde::rfc3339")]
    snapshot: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SyncWire {
    vector: BTreeMap<String, u64>,
    lineage: BTreeMap<String, LineageWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LineageWire {
    hostname: String,
    #[serde(with = "time::serde::rfc3339")]
    last_seen: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PackageWire {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    integrity: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    installed_at: OffsetDateTime,
    // Not in the minimum §6 field list, but needed for provenance to
    // round-trip; the document schema is a minimum, not a ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provenance: Option<ProvenanceWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProvenanceWire {
    modified_by: String,
    vector_at_change: BTreeMap<String, u64>,
}

fn validate_integrity(value: &str) -> Result<(), PersistError> {
    let (algo, digest) = value
        .split_once(':')
        .ok_or_else(|| PersistError::InvalidIntegrity(value.to_string()))?;
    let decoded =
        hex::decode(digest).map_err(|_| PersistError::InvalidIntegrity(value.to_string()))?;
    let expected_len = match algo {
        "sha256" => Some(32),
        "sha512" => Some(64),
        _ => None,
    };
    if let Some(len) = expected_len {
        if decoded.len() != len {
            return Err(PersistError::InvalidIntegrity(value.to_string()));
        }
    }
    Ok(())
}

fn parse_vector(entries: BTreeMap<String, u64>) -> Result<VersionVector, PersistError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (machine, counter) in entries {
        pairs.push((MachineId::parse(&machine)?, counter));
    }
    Ok(pairs.into_iter().collect())
}

fn document_to_state(document: DocumentV2) -> Result<LockfileState, PersistError> {
    let mut packages = BTreeMap::new();
    for (key_str, wire) in document.packages {
        let key: PackageKey = key_str
            .parse()
            .map_err(|_| PersistError::InvalidPackageKey(key_str.clone()))?;
        if let Some(integrity) = &wire.integrity {
            validate_integrity(integrity)?;
        }
        let provenance = match wire.provenance {
            Some(p) => Provenance::new(
                MachineId::parse(&p.modified_by)?,
                parse_vector(p.vector_at_change)?,
            ),
            None => Provenance::default(),
        };
        let entry = PackageLockInfo {
            version: wire.version,
            provenance,
            modified_at: wire.installed_at,
            integrity: wire.integrity,
        };
        packages.insert(key, entry);
    }

    let metadata = match document.sync {
        Some(sync) => {
            let vector = parse_vector(sync.vector)?;
            let mut lineage = BTreeMap::new();
            for (machine_str, wire) in sync.lineage {
                let machine = MachineId::parse(&machine_str)?;
                lineage.insert(machine, MachineLineage::new(machine, wire.hostname, wire.last_seen));
            }
            Some(SyncMetadata { vector, lineage })
        }
        None => None,
    };

    Ok(LockfileState { packages, metadata })
}

fn state_to_document(state: &LockfileState) -> DocumentV2 {
    let packages = state
        .packages
        .iter()
        .map(|(key, info)| {
            let provenance = if info.provenance.is_zero() {
                None
            } else {
                Some(ProvenanceWire {
                    modified_by: info.provenance.modified_by.to_string(),
                    vector_at_change: info
                        .provenance
                        .vector_at_change
                        .iter()
                        .map(|(m, c)| (m.to_string(), c))
                        .collect(),
                })
            };
            (
                key.to_string(),
                PackageWire {
                    version: info.version.clone(),
                    integrity: info.integrity.clone(),
                    installed_at: info.modified_at,
                    provenance,
                },
            )
        })
        .collect();

    let sync = state.metadata.as_ref().map(|meta| SyncWire {
        vector: meta.vector.iter().map(|(m, c)| (m.to_string(), c)).collect(),
        lineage: meta
            .lineage
            .iter()
            .map(|(m, l)| {
                (
                    m.to_string(),
                    LineageWire {
                        hostname: l.hostname.clone(),
                        last_seen: l.last_seen,
                    },
                )
            })
            .collect(),
    });

    DocumentV2 {
        version: SCHEMA_VERSION,
        mode: "locked".to_string(),
        machine_info: MachineInfoWire {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            hostname: String::new(),
            snapshot: OffsetDateTime::now_utc(),
        },
        sync,
        packages,
    }
}
