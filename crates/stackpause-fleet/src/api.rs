//! Cloud API seams consumed by the fleet layer.

use std::collections::BTreeMap;

use async_trait::async_trait;

use stackpause_core::Capacity;

use crate::error::FleetResult;

/// Scaling processes toggled on every suspend and resume.
pub const SCALING_PROCESSES: [&str; 7] = [
    "Launch",
    "HealthCheck",
    "ReplaceUnhealthy",
    "AZRebalance",
    "AlarmNotification",
    "ScheduledActions",
    "AddToLoadBalancer",
];

/// Granularity used when re-enabling group metrics.
pub const METRICS_GRANULARITY: &str = "1Minute";

/// Point-in-time view of an auto-scaling group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingGroup {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub capacity: Capacity,
    /// Instances currently attached to the group.
    pub instance_count: u32,
    pub suspended_processes: Vec<String>,
    pub metrics_enabled: bool,
}

impl ScalingGroup {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Health grade reported for an application environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHealth {
    pub name: String,
    /// Grade string as reported ("Green", "Yellow", "Red", "Grey").
    pub health: String,
}

/// Auto-scaling group operations.
#[async_trait]
pub trait ScalingApi: Send + Sync {
    async fn describe_groups(&self) -> FleetResult<Vec<ScalingGroup>>;

    async fn suspend_processes(&self, group: &str, processes: &[&str]) -> FleetResult<()>;

    async fn resume_processes(&self, group: &str, processes: &[&str]) -> FleetResult<()>;

    async fn disable_metrics_collection(&self, group: &str) -> FleetResult<()>;

    async fn enable_metrics_collection(&self, group: &str, granularity: &str) -> FleetResult<()>;

    async fn update_capacity(&self, group: &str, capacity: Capacity) -> FleetResult<()>;
}

/// Application-environment health listing.
#[async_trait]
pub trait EnvironmentApi: Send + Sync {
    async fn describe_environments(&self) -> FleetResult<Vec<EnvironmentHealth>>;
}
