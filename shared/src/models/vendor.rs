//! Vendor identity and sync strategy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable vendor identifier (registry key)
///
/// Assigned in the vendor configuration and never derived from display
/// names, so renaming a supplier does not orphan its sync state or mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(String);

impl VendorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VendorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VendorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for VendorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How a sync job pulls and applies the vendor catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Re-pull the whole catalog, merge every item
    Full,
    /// Pull only items changed since the last successful run
    Incremental,
    /// Pull the whole catalog, only build/repair vendor mappings
    MappingOnly,
}

impl SyncStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStrategy::Full => "full",
            SyncStrategy::Incremental => "incremental",
            SyncStrategy::MappingOnly => "mapping_only",
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SyncStrategy::Full),
            "incremental" => Ok(SyncStrategy::Incremental),
            "mapping_only" | "mapping-only" => Ok(SyncStrategy::MappingOnly),
            other => Err(format!("unknown sync strategy: {other}")),
        }
    }
}
