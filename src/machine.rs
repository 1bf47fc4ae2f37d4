//! Opaque per-machine identity.
//!
//! Concrete scheme: UUIDv4, serialized as the canonical 36-character
//! lowercase form. Parsing rejects anything that isn't a well-formed v4
//! (version nibble `4`, variant nibble in `{8,9,a,b}`), matching the
//! bootstrap pattern in the reference pack's `tether-cli` state file and
//! `cargo-credential`'s permission-conscious credential file handling.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MachineIdError;

/// A stable, opaque per-machine identifier.
///
/// The zero value (`Uuid::nil()`) is the "empty" identifier: it is a
/// legal sentinel (used by the zero [`crate::provenance::Provenance`])
/// but [`MachineId::is_valid`] reports it as unusable for real identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(Uuid);

impl MachineId {
    /// Generate a fresh random v4 machine id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a canonical UUID string, rejecting anything that is not a
    /// well-formed v4 (version nibble `4`, variant nibble in `{8,9,a,b}`).
    pub fn parse(s: &str) -> Result<Self, MachineIdError> {
        let uuid =
            Uuid::parse_str(s).map_err(|_| MachineIdError::InvalidMachineId(s.to_string()))?;
        if uuid.get_version_num() != 4 {
            return Err(MachineIdError::InvalidMachineId(s.to_string()));
        }
        match uuid.get_variant() {
            uuid::Variant::RFC4122 => {}
            _ => return Err(MachineIdError::InvalidMachineId(s.to_string())),
        }
        Ok(Self(uuid))
    }

    /// The zero/empty identifier. Never valid for use as a real machine id.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Whether this is a real, usable machine id (not the zero sentinel).
    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }

    /// Read a machine id from `path`, generating and persisting a new one
    /// (mode 0600 on unix) if the file does not yet exist.
    ///
    /// This is the one piece of machine-identity I/O the core owns per
    /// §6: "a stable opaque machine identifier is supplied" has to come
    /// from somewhere, and every caller needs the same bootstrap.
    pub fn load_or_create(path: &Path) -> Result<Self, MachineIdError> {
        match Self::load(path) {
            Ok(id) => Ok(id),
            Err(MachineIdError::MachineIdNotFound(_)) => {
                let id = Self::new();
                id.persist(path)?;
                Ok(id)
            }
            Err(err) => Err(err),
        }
    }

    /// Read a machine id from `path`, failing with
    /// [`MachineIdError::MachineIdNotFound`] rather than creating one.
    /// For callers (e.g. a strict-mode CLI flag) that want to distinguish
    /// "no identity yet" from a read/parse failure without the
    /// side effect of writing a new id file.
    pub fn load(path: &Path) -> Result<Self, MachineIdError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(contents.trim()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(MachineIdError::MachineIdNotFound(path.to_path_buf()))
            }
            Err(source) => Err(MachineIdError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn persist(&self, path: &Path) -> Result<(), MachineIdError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| MachineIdError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_string()).map_err(|source| MachineIdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(path, perms);
        }
        Ok(())
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for MachineId {
    type Err = MachineIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
