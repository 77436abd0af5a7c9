//! Capacity planner: environment name → target capacity.

use std::collections::BTreeMap;

use stackpause_core::{Capacity, CapacityOverride};

/// Default {1,2,1} patched by the environment's override, if any.
///
/// Pure and total. Invariant violations in the override are rejected
/// when the config is validated, not here.
pub fn capacity_for(environment: &str, overrides: &BTreeMap<String, CapacityOverride>) -> Capacity {
    match overrides.get(environment) {
        Some(patch) => Capacity::default().patched(patch),
        None => Capacity::default(),
    }
}

/// Capacity lookups bound to a fixed set of overrides.
#[derive(Debug, Clone, Default)]
pub struct CapacityPlanner {
    overrides: BTreeMap<String, CapacityOverride>,
}

impl CapacityPlanner {
    pub fn new(overrides: BTreeMap<String, CapacityOverride>) -> Self {
        Self { overrides }
    }

    /// Running capacity for an environment.
    pub fn capacity_for(&self, environment: &str) -> Capacity {
        capacity_for(environment, &self.overrides)
    }

    /// Capacity an environment is parked at while suspended.
    pub fn suspended_for(&self, environment: &str) -> Capacity {
        let size = self
            .overrides
            .get(environment)
            .and_then(|o| o.suspended_size)
            .unwrap_or(0);
        Capacity::uniform(size)
    }
}
