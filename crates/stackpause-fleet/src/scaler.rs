//! Scale controller: parks and revives scaling groups.
//!
//! Each group is handled in turn: toggle the scaling processes, toggle
//! metrics collection, then write the new capacity. A failure stops
//! the loop; groups already handled stay as they are.

use std::sync::Arc;

use tracing::debug;

use stackpause_core::{Notifier, TierKind};

use crate::api::{METRICS_GRANULARITY, SCALING_PROCESSES};
use crate::capacity::CapacityPlanner;
use crate::error::FleetResult;
use crate::registry::FleetRegistry;

pub struct ScaleController {
    registry: Arc<FleetRegistry>,
    planner: CapacityPlanner,
    notifier: Arc<dyn Notifier>,
}

impl ScaleController {
    pub fn new(
        registry: Arc<FleetRegistry>,
        planner: CapacityPlanner,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            planner,
            notifier,
        }
    }

    pub fn registry(&self) -> &Arc<FleetRegistry> {
        &self.registry
    }

    pub fn planner(&self) -> &CapacityPlanner {
        &self.planner
    }

    /// Suspend the named environments at their suspended capacity.
    pub async fn scale_down(&self, environments: &[String]) -> FleetResult<()> {
        let api = self.registry.scaling_api();
        for environment in environments {
            let group = self.registry.group_for(environment).await?;
            let capacity = self.planner.suspended_for(environment);
            self.notifier.info(&format!(
                "Scaling {environment} down to {}",
                capacity.desired_capacity
            ));

            api.suspend_processes(&group, &SCALING_PROCESSES).await?;
            api.disable_metrics_collection(&group).await?;
            api.update_capacity(&group, capacity).await?;
            debug!(%environment, %group, %capacity, "environment suspended");
        }
        Ok(())
    }

    /// Suspend every discovered environment.
    pub async fn scale_down_all(&self) -> FleetResult<()> {
        let environments = self.registry.environments().await?;
        self.scale_down(&environments).await
    }

    /// Resume the named environments, optionally only those in `tier`.
    ///
    /// Returns the environments that were actually scaled.
    pub async fn scale_up(
        &self,
        environments: &[String],
        tier: Option<TierKind>,
    ) -> FleetResult<Vec<String>> {
        let api = self.registry.scaling_api();
        let mut scaled = Vec::new();
        for environment in environments {
            if let Some(tier) = tier
                && !tier.matches(environment)
            {
                continue;
            }

            let group = self.registry.group_for(environment).await?;
            let capacity = self.planner.capacity_for(environment);
            self.notifier
                .info(&format!("Scaling {environment} up to {capacity}"));

            api.resume_processes(&group, &SCALING_PROCESSES).await?;
            api.enable_metrics_collection(&group, METRICS_GRANULARITY)
                .await?;
            api.update_capacity(&group, capacity).await?;
            debug!(%environment, %group, %capacity, "environment resumed");
            scaled.push(environment.clone());
        }
        Ok(scaled)
    }

    /// Resume every discovered environment.
    pub async fn scale_up_all(&self) -> FleetResult<Vec<String>> {
        let environments = self.registry.environments().await?;
        self.scale_up(&environments, None).await
    }

    /// Resume every discovered environment belonging to `tier`.
    pub async fn scale_up_tier(&self, tier: TierKind) -> FleetResult<Vec<String>> {
        let environments = self.registry.environments().await?;
        self.scale_up(&environments, Some(tier)).await
    }

    /// Node count a tier must reach before it counts as ready.
    ///
    /// The desired capacity of the tier's environment; the largest when
    /// several match, the default when none do.
    pub async fn required_nodes(&self, tier: TierKind) -> FleetResult<u32> {
        let environments = self.registry.environments().await?;
        let required = environments
            .iter()
            .filter(|env| tier.matches(env))
            .map(|env| self.planner.capacity_for(env).desired_capacity)
            .max()
            .unwrap_or_else(|| stackpause_core::Capacity::default().desired_capacity);
        Ok(required)
    }
}
