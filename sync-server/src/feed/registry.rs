//! Vendor registry
//!
//! Vendors are declared once in a JSON file and resolved at startup into a
//! feed adapter keyed by their stable [`VendorId`]. Lookups are exact; there
//! is no matching on display names.
//!
//! ```json
//! [
//!   {
//!     "id": "acme",
//!     "name": "ACME Distribution",
//!     "trust_weight": 60,
//!     "sync_interval_secs": 3600,
//!     "feed": { "kind": "http_json", "base_url": "https://feeds.acme.test", "api_key": "..." }
//!   }
//! ]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::models::VendorId;
use thiserror::Error;

use super::{FeedNormalizer, FeedSetupError, HttpJsonFeed};

/// Highest accepted trust weight
pub const MAX_TRUST_WEIGHT: u8 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedConfig {
    HttpJson {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorConfig {
    pub id: VendorId,
    pub name: String,
    /// 0-100, how much this vendor's data is trusted over others
    pub trust_weight: u8,
    /// Scheduled incremental sync period; `None` means manual only
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
    pub feed: FeedConfig,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read vendor registry: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse vendor registry: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid vendor registry: {0}")]
    Invalid(String),

    #[error("vendor {vendor} has an unusable feed: {source}")]
    Feed {
        vendor: VendorId,
        #[source]
        source: FeedSetupError,
    },
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::config(err.to_string())
    }
}

/// A registered vendor with its resolved feed
#[derive(Clone)]
pub struct VendorEntry {
    pub config: VendorConfig,
    pub feed: Arc<dyn FeedNormalizer>,
}

impl VendorEntry {
    pub fn id(&self) -> &VendorId {
        &self.config.id
    }

    pub fn trust_weight(&self) -> u8 {
        self.config.trust_weight
    }
}

#[derive(Clone, Default)]
pub struct VendorRegistry {
    vendors: BTreeMap<VendorId, VendorEntry>,
}

impl VendorRegistry {
    /// Load and resolve the registry file. A missing file yields an empty registry.
    pub fn load(path: &Path, feed_timeout: Duration) -> Result<Self, RegistryError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Vendor registry not found, no vendors registered");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let configs: Vec<VendorConfig> = serde_json::from_str(&raw)?;
        Self::from_configs(configs, feed_timeout)
    }

    pub fn from_configs(
        configs: Vec<VendorConfig>,
        feed_timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let entries = configs
            .into_iter()
            .map(|config| {
                let feed: Arc<dyn FeedNormalizer> = match &config.feed {
                    FeedConfig::HttpJson { base_url, api_key } => Arc::new(
                        HttpJsonFeed::new(base_url, api_key.clone(), feed_timeout).map_err(
                            |source| RegistryError::Feed {
                                vendor: config.id.clone(),
                                source,
                            },
                        )?,
                    ),
                };
                Ok(VendorEntry { config, feed })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        Self::from_entries(entries)
    }

    /// Build from already-resolved entries
    pub fn from_entries(entries: Vec<VendorEntry>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        let mut vendors = BTreeMap::new();

        for entry in entries {
            let id = entry.config.id.clone();
            if id.as_str().trim().is_empty() {
                return Err(RegistryError::Invalid("vendor id must not be empty".into()));
            }
            if !seen.insert(id.clone()) {
                return Err(RegistryError::Invalid(format!("duplicate vendor id {id}")));
            }
            if entry.config.trust_weight > MAX_TRUST_WEIGHT {
                return Err(RegistryError::Invalid(format!(
                    "vendor {id}: trust_weight {} exceeds {MAX_TRUST_WEIGHT}",
                    entry.config.trust_weight
                )));
            }
            vendors.insert(id, entry);
        }

        tracing::info!(vendors = vendors.len(), "Vendor registry loaded");
        Ok(Self { vendors })
    }

    pub fn get(&self, id: &VendorId) -> Option<&VendorEntry> {
        self.vendors.get(id)
    }

    pub fn contains(&self, id: &VendorId) -> bool {
        self.vendors.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &VendorId> {
        self.vendors.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VendorEntry> {
        self.vendors.values()
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "acme", "name": "ACME", "trust_weight": 60, "sync_interval_secs": 600,
                  "feed": {{"kind": "http_json", "base_url": "https://feeds.acme.test", "api_key": "k"}}}},
                {{"id": "globex", "name": "Globex", "trust_weight": 20,
                  "feed": {{"kind": "http_json", "base_url": "https://globex.test/api/"}}}}
            ]"#
        )
        .unwrap();

        let registry = VendorRegistry::load(file.path(), TIMEOUT).unwrap();
        assert_eq!(registry.len(), 2);

        let acme = registry.get(&VendorId::from("acme")).unwrap();
        assert_eq!(acme.trust_weight(), 60);
        assert_eq!(acme.config.sync_interval_secs, Some(600));
        assert!(registry.get(&VendorId::from("ACME")).is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VendorRegistry::load(&dir.path().join("vendors.json"), TIMEOUT).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_trust() {
        let config = |id: &str, trust: u8| VendorConfig {
            id: VendorId::from(id),
            name: id.to_string(),
            trust_weight: trust,
            sync_interval_secs: None,
            feed: FeedConfig::HttpJson {
                base_url: "https://feeds.test".into(),
                api_key: None,
            },
        };

        let dup = VendorRegistry::from_configs(vec![config("a", 1), config("a", 2)], TIMEOUT);
        assert!(matches!(dup, Err(RegistryError::Invalid(_))));

        let too_trusted = VendorRegistry::from_configs(vec![config("a", 101)], TIMEOUT);
        assert!(matches!(too_trusted, Err(RegistryError::Invalid(_))));
    }

    #[test]
    fn test_unusable_feed_url_names_the_vendor() {
        let config = VendorConfig {
            id: VendorId::from("acme"),
            name: "ACME".into(),
            trust_weight: 50,
            sync_interval_secs: None,
            feed: FeedConfig::HttpJson {
                base_url: "not a url".into(),
                api_key: None,
            },
        };

        let Err(err) = VendorRegistry::from_configs(vec![config], TIMEOUT) else {
            panic!("registry accepted an unparseable base_url");
        };
        assert!(matches!(
            &err,
            RegistryError::Feed { vendor, source: FeedSetupError::InvalidUrl(..) }
                if vendor.as_str() == "acme"
        ));
        assert!(err.to_string().starts_with("vendor acme has an unusable feed"));
    }

    #[test]
    fn test_unknown_feed_kind_is_parse_error() {
        let raw = r#"[{"id":"a","name":"A","trust_weight":1,"feed":{"kind":"ftp_csv"}}]"#;
        let parsed: Result<Vec<VendorConfig>, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }
}
