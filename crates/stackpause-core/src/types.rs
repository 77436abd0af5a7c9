//! Shared types used across stackpause crates.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Capacity ───────────────────────────────────────────────────────

/// The {min, max, desired} instance-count triple of a scaling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 2,
            desired_capacity: 1,
        }
    }
}

impl Capacity {
    /// A capacity with min, max and desired all set to `size`.
    pub fn uniform(size: u32) -> Self {
        Self {
            min_size: size,
            max_size: size,
            desired_capacity: size,
        }
    }

    /// Whether `min <= desired <= max` holds.
    pub fn is_valid(&self) -> bool {
        self.min_size <= self.desired_capacity && self.desired_capacity <= self.max_size
    }

    /// Apply a partial override field-by-field.
    pub fn patched(self, patch: &CapacityOverride) -> Self {
        Self {
            min_size: patch.min_size.unwrap_or(self.min_size),
            max_size: patch.max_size.unwrap_or(self.max_size),
            desired_capacity: patch.desired_capacity.unwrap_or(self.desired_capacity),
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.min_size, self.max_size, self.desired_capacity
        )
    }
}

/// Per-environment patch applied on top of the default capacity.
///
/// Every field is optional; absent fields keep the default value.
/// `suspended_size` is the capacity the environment is parked at while
/// the stack is suspended (0 when absent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityOverride {
    #[serde(default, alias = "min", skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(default, alias = "max", skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(default, alias = "desired", skip_serializing_if = "Option::is_none")]
    pub desired_capacity: Option<u32>,
    #[serde(default, alias = "suspended", skip_serializing_if = "Option::is_none")]
    pub suspended_size: Option<u32>,
}

// ── Tiers ──────────────────────────────────────────────────────────

/// Tier class an environment belongs to.
///
/// Topology is fixed: an environment belongs to a tier when its name
/// contains one of the tier's markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// ZooKeeper ensemble.
    Coordination,
    /// Solr cloud nodes.
    Search,
    /// Fedora binary-object repository.
    Repository,
    /// Cantaloupe IIIF image server.
    ImageServer,
    /// Web applications and background workers.
    Web,
}

impl TierKind {
    pub const ALL: [TierKind; 5] = [
        TierKind::Coordination,
        TierKind::Search,
        TierKind::Repository,
        TierKind::ImageServer,
        TierKind::Web,
    ];

    /// Name fragments identifying this tier's environments.
    pub fn markers(&self) -> &'static [&'static str] {
        match self {
            TierKind::Coordination => &["-zookeeper"],
            TierKind::Search => &["-solr"],
            TierKind::Repository => &["-fcrepo"],
            TierKind::ImageServer => &["-cantaloupe"],
            TierKind::Web => &["-webapp", "-workers"],
        }
    }

    /// Whether `environment` belongs to this tier.
    pub fn matches(&self, environment: &str) -> bool {
        self.markers().iter().any(|m| environment.contains(m))
    }

    /// The tier an environment belongs to, if any.
    pub fn classify(environment: &str) -> Option<TierKind> {
        Self::ALL.into_iter().find(|t| t.matches(environment))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TierKind::Coordination => "Zookeeper",
            TierKind::Search => "Solr",
            TierKind::Repository => "Fedora",
            TierKind::ImageServer => "Cantaloupe",
            TierKind::Web => "Webapps",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
