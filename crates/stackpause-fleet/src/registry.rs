//! Fleet registry: which scaling group backs which environment.
//!
//! The environment → group table is discovered once per registry and
//! memoized; instance counts and health are re-read on every call.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::api::{EnvironmentApi, ScalingApi};
use crate::error::{FleetError, FleetResult};

/// Grade reported for environments the health API does not know.
pub const UNKNOWN_HEALTH: &str = "Unknown";

/// Live status of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStatus {
    pub count: u32,
    pub health: String,
}

pub struct FleetRegistry {
    scaling: Arc<dyn ScalingApi>,
    environments: Arc<dyn EnvironmentApi>,
    /// Tag key whose value names the environment.
    environment_tag: String,
    /// environment → scaling group name.
    groups: OnceCell<BTreeMap<String, String>>,
}

impl FleetRegistry {
    pub fn new(
        scaling: Arc<dyn ScalingApi>,
        environments: Arc<dyn EnvironmentApi>,
        environment_tag: &str,
    ) -> Self {
        Self {
            scaling,
            environments,
            environment_tag: environment_tag.to_string(),
            groups: OnceCell::new(),
        }
    }

    /// The scaling API this registry discovers through.
    pub fn scaling_api(&self) -> &Arc<dyn ScalingApi> {
        &self.scaling
    }

    /// Environment → scaling-group table, fetched on first use.
    pub async fn discover(&self) -> FleetResult<&BTreeMap<String, String>> {
        self.groups
            .get_or_try_init(|| async {
                let groups = self.scaling.describe_groups().await?;
                let mut table = BTreeMap::new();
                for group in groups {
                    let Some(environment) = group.tag(&self.environment_tag) else {
                        debug!(group = %group.name, tag = %self.environment_tag, "untagged scaling group skipped");
                        continue;
                    };
                    if let Some(previous) = table.insert(environment.to_string(), group.name.clone()) {
                        warn!(%environment, %previous, current = %group.name, "environment tagged on multiple groups");
                    }
                }
                debug!(environments = table.len(), "fleet discovered");
                Ok::<_, FleetError>(table)
            })
            .await
    }

    /// Discovered environment names, sorted.
    pub async fn environments(&self) -> FleetResult<Vec<String>> {
        Ok(self.discover().await?.keys().cloned().collect())
    }

    /// Scaling group backing `environment`.
    pub async fn group_for(&self, environment: &str) -> FleetResult<String> {
        self.discover()
            .await?
            .get(environment)
            .cloned()
            .ok_or_else(|| FleetError::UnknownEnvironment(environment.to_string()))
    }

    /// Live instance count per environment.
    pub async fn instance_counts(&self) -> FleetResult<BTreeMap<String, u32>> {
        let groups = self.scaling.describe_groups().await?;
        Ok(groups
            .into_iter()
            .filter_map(|g| {
                let environment = g.tag(&self.environment_tag)?.to_string();
                Some((environment, g.instance_count))
            })
            .collect())
    }

    /// Health grade per environment; unmatched environments are "Unknown".
    pub async fn health(&self) -> FleetResult<BTreeMap<String, String>> {
        Ok(self
            .status()
            .await?
            .into_iter()
            .map(|(env, status)| (env, status.health))
            .collect())
    }

    /// Instance count joined with health grade, per environment.
    pub async fn status(&self) -> FleetResult<BTreeMap<String, EnvironmentStatus>> {
        let counts = self.instance_counts().await?;
        let grades: BTreeMap<String, String> = self
            .environments
            .describe_environments()
            .await?
            .into_iter()
            .map(|e| (e.name, e.health))
            .collect();

        Ok(counts
            .into_iter()
            .map(|(environment, count)| {
                let health = grades
                    .get(&environment)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_HEALTH.to_string());
                (environment, EnvironmentStatus { count, health })
            })
            .collect())
    }
}
