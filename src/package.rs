//! Package keys and locked package entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::provenance::Provenance;

/// A `"<provider>:<name>"` key identifying a package across providers
/// (brew, apt, cargo, pip, gem, npm, ...). The core treats `provider`
/// and `name` as opaque strings; it never validates their shape beyond
/// "non-empty".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageKey {
    provider: String,
    name: String,
}

/// Parsing a malformed package key string.
#[derive(Debug, thiserror::Error)]
#[error("invalid package key `{0}` (expected `provider:name`)")]
pub struct PackageKeyParseError(pub String);

impl PackageKey {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Result<Self, PackageKeyParseError> {
        let provider = provider.into();
        let name = name.into();
        if provider.is_empty() || name.is_empty() {
            return Err(PackageKeyParseError(format!("{provider}:{name}")));
        }
        Ok(Self { provider, name })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for PackageKey {
    type Err = PackageKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((provider, name)) if !provider.is_empty() && !name.is_empty() => Ok(Self {
                provider: provider.to_string(),
                name: name.to_string(),
            }),
            _ => Err(PackageKeyParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for PackageKey {
    type Error = PackageKeyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PackageKey> for String {
    fn from(key: PackageKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

/// A locked package entry: the version pinned on this machine, who
/// pinned it and when (causally), and when (in wall-clock time).
///
/// `integrity` is an opaque passthrough: the core never inspects its
/// content (providers own integrity semantics) but validates its shape
/// (`"algo:hex"`) at the persistence boundary, since §7 assigns the core
/// the `InvalidIntegrity` error kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLockInfo {
    pub version: String,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

impl PackageLockInfo {
    pub fn new(version: impl Into<String>, modified_at: OffsetDateTime) -> Self {
        Self {
            version: version.into(),
            provenance: Provenance::default(),
            modified_at,
            integrity: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_integrity(mut self, integrity: impl Into<String>) -> Self {
        self.integrity = Some(integrity.into());
        self
    }

    /// Whether this is the zero sentinel ("absent").
    pub fn is_zero(&self) -> bool {
        self.version.is_empty() && self.provenance.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_key() {
        let key: PackageKey = "brew:ripgrep".parse().unwrap();
        assert_eq!(key.provider(), "brew");
        assert_eq!(key.name(), "ripgrep");
        assert_eq!(key.to_string(), "brew:ripgrep");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!("brewripgrep".parse::<PackageKey>().is_err());
    }

    #[test]
    fn rejects_empty_halves() {
        assert!(":ripgrep".parse::<PackageKey>().is_err());
        assert!("brew:".parse::<PackageKey>().is_err());
    }

    #[test]
    fn json_roundtrips_as_string() {
        let key = PackageKey::new("cargo", "serde").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"cargo:serde\"");
        let back: PackageKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
