//! In-memory fleet backend (for testing).
//!
//! Implements both cloud API traits over a mutable list of groups and
//! records every call, so tests can assert on ordering.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use stackpause_core::Capacity;

use crate::api::{EnvironmentApi, EnvironmentHealth, ScalingApi, ScalingGroup};
use crate::error::{FleetError, FleetResult};

/// A recorded cloud API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCall {
    Describe,
    Suspend { group: String, processes: Vec<String> },
    Resume { group: String, processes: Vec<String> },
    DisableMetrics { group: String },
    EnableMetrics { group: String, granularity: String },
    UpdateCapacity { group: String, capacity: Capacity },
}

impl FleetCall {
    /// The group a mutating call targeted.
    pub fn group(&self) -> Option<&str> {
        match self {
            FleetCall::Describe => None,
            FleetCall::Suspend { group, .. }
            | FleetCall::Resume { group, .. }
            | FleetCall::DisableMetrics { group }
            | FleetCall::EnableMetrics { group, .. }
            | FleetCall::UpdateCapacity { group, .. } => Some(group),
        }
    }
}

#[derive(Default)]
pub struct InMemoryFleet {
    groups: Mutex<Vec<ScalingGroup>>,
    health: Mutex<BTreeMap<String, String>>,
    calls: Mutex<Vec<FleetCall>>,
    fail_listing: AtomicBool,
}

impl InMemoryFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group, optionally tagged `name=<environment>`.
    pub fn add_group(&self, name: &str, environment: Option<&str>, capacity: Capacity, instances: u32) {
        let mut tags = BTreeMap::new();
        if let Some(env) = environment {
            tags.insert("name".to_string(), env.to_string());
        }
        lock(&self.groups).push(ScalingGroup {
            name: name.to_string(),
            tags,
            capacity,
            instance_count: instances,
            suspended_processes: Vec::new(),
            metrics_enabled: true,
        });
    }

    pub fn set_environment_health(&self, environment: &str, grade: &str) {
        lock(&self.health).insert(environment.to_string(), grade.to_string());
    }

    /// Make every listing call fail with a connectivity error.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<FleetCall> {
        lock(&self.calls).clone()
    }

    /// Mutating calls only, in order.
    pub fn mutations(&self) -> Vec<FleetCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, FleetCall::Describe))
            .collect()
    }

    pub fn group(&self, name: &str) -> Option<ScalingGroup> {
        lock(&self.groups).iter().find(|g| g.name == name).cloned()
    }

    fn record(&self, call: FleetCall) {
        lock(&self.calls).push(call);
    }

    fn with_group<F>(&self, name: &str, f: F) -> FleetResult<()>
    where
        F: FnOnce(&mut ScalingGroup),
    {
        let mut groups = lock(&self.groups);
        let group = groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| FleetError::Connectivity(format!("group not found: {name}")))?;
        f(group);
        Ok(())
    }
}

#[async_trait]
impl ScalingApi for InMemoryFleet {
    async fn describe_groups(&self) -> FleetResult<Vec<ScalingGroup>> {
        self.record(FleetCall::Describe);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(FleetError::Connectivity("describe groups: connection refused".to_string()));
        }
        Ok(lock(&self.groups).clone())
    }

    async fn suspend_processes(&self, group: &str, processes: &[&str]) -> FleetResult<()> {
        self.record(FleetCall::Suspend {
            group: group.to_string(),
            processes: owned(processes),
        });
        self.with_group(group, |g| g.suspended_processes = owned(processes))
    }

    async fn resume_processes(&self, group: &str, processes: &[&str]) -> FleetResult<()> {
        self.record(FleetCall::Resume {
            group: group.to_string(),
            processes: owned(processes),
        });
        self.with_group(group, |g| {
            g.suspended_processes.retain(|p| !processes.contains(&p.as_str()))
        })
    }

    async fn disable_metrics_collection(&self, group: &str) -> FleetResult<()> {
        self.record(FleetCall::DisableMetrics {
            group: group.to_string(),
        });
        self.with_group(group, |g| g.metrics_enabled = false)
    }

    async fn enable_metrics_collection(&self, group: &str, granularity: &str) -> FleetResult<()> {
        self.record(FleetCall::EnableMetrics {
            group: group.to_string(),
            granularity: granularity.to_string(),
        });
        self.with_group(group, |g| g.metrics_enabled = true)
    }

    async fn update_capacity(&self, group: &str, capacity: Capacity) -> FleetResult<()> {
        self.record(FleetCall::UpdateCapacity {
            group: group.to_string(),
            capacity,
        });
        self.with_group(group, |g| {
            g.capacity = capacity;
            g.instance_count = capacity.desired_capacity;
        })
    }
}

#[async_trait]
impl EnvironmentApi for InMemoryFleet {
    async fn describe_environments(&self) -> FleetResult<Vec<EnvironmentHealth>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(FleetError::Connectivity("describe environments: connection refused".to_string()));
        }
        Ok(lock(&self.health)
            .iter()
            .map(|(name, health)| EnvironmentHealth {
                name: name.clone(),
                health: health.clone(),
            })
            .collect())
    }
}

fn owned(processes: &[&str]) -> Vec<String> {
    processes.iter().map(|p| p.to_string()).collect()
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
