//! scaling.toml session configuration.
//!
//! The document is read once per command. `collections` and `backups`
//! are session state: `suspend` fills `backups` and the caller writes the
//! document back so the next `resume` can find them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Capacity, CapacityOverride};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub dns_zone: String,
    /// Scaling-group tag whose value names the environment.
    #[serde(default = "default_environment_tag")]
    pub environment_tag: String,
    #[serde(default)]
    pub solr: SolrSettings,
    #[serde(default)]
    pub scaling: BTreeMap<String, CapacityOverride>,
    /// Cached collection names, filled on first listing.
    #[serde(default)]
    pub collections: Vec<String>,
    /// collection → backup name, written by `suspend`.
    #[serde(default)]
    pub backups: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolrSettings {
    /// Shared filesystem path on the Solr nodes where backups live.
    #[serde(default = "default_backup_location")]
    pub backup_location: String,
}

impl Default for SolrSettings {
    fn default() -> Self {
        Self {
            backup_location: default_backup_location(),
        }
    }
}

fn default_environment_tag() -> String {
    "name".to_string()
}

fn default_backup_location() -> String {
    "/data/backup".to_string()
}

impl SessionConfig {
    /// Create a config for `dns_zone` with every other field defaulted.
    pub fn new(dns_zone: &str) -> Self {
        Self {
            dns_zone: dns_zone.to_string(),
            environment_tag: default_environment_tag(),
            ..Default::default()
        }
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(?path, overrides = config.scaling.len(), "session config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SessionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the document back, including session state.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })?;
        debug!(?path, backups = self.backups.len(), "session config saved");
        Ok(())
    }

    /// Reject documents that would lead to invalid scaling requests.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.dns_zone.trim().is_empty() {
            return Err(ConfigError::MissingDnsZone);
        }

        for (environment, patch) in &self.scaling {
            let capacity = Capacity::default().patched(patch);
            if !capacity.is_valid() {
                return Err(ConfigError::InvalidCapacity {
                    environment: environment.clone(),
                    capacity,
                });
            }
            if let Some(suspended) = patch.suspended_size
                && suspended > capacity.max_size
            {
                return Err(ConfigError::InvalidSuspendedSize {
                    environment: environment.clone(),
                    suspended,
                    max: capacity.max_size,
                });
            }
        }

        Ok(())
    }

    /// Fully-qualified name of an internal service host.
    pub fn host_for(&self, name: &str) -> String {
        format!("{name}.repo.vpc.{}", self.dns_zone)
    }
}
