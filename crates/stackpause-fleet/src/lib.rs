//! stackpause-fleet: scaling-group control for a suspendable stack.
//!
//! Discovers the auto-scaling groups that back each environment, plans
//! their capacity from defaults plus per-environment overrides, and
//! parks or revives them.
//!
//! # Suspend / resume of a group
//!
//! ```text
//! scale_down(env):
//!     suspend  Launch HealthCheck ReplaceUnhealthy AZRebalance
//!              AlarmNotification ScheduledActions AddToLoadBalancer
//!     disable  metrics collection
//!     update   min = max = desired = suspended_size (default 0)
//!
//! scale_up(env):
//!     resume   the same seven processes
//!     enable   metrics collection at 1Minute granularity
//!     update   capacity_for(env)   // {1,2,1} patched by overrides
//! ```
//!
//! The cloud APIs sit behind the `ScalingApi` and `EnvironmentApi`
//! traits; `aws` provides the production implementations.

pub mod api;
pub mod aws;
pub mod capacity;
pub mod error;
pub mod memory;
pub mod registry;
pub mod scaler;

pub use api::{
    EnvironmentApi, EnvironmentHealth, METRICS_GRANULARITY, SCALING_PROCESSES, ScalingApi,
    ScalingGroup,
};
pub use capacity::{CapacityPlanner, capacity_for};
pub use error::{FleetError, FleetResult};
pub use memory::{FleetCall, InMemoryFleet};
pub use registry::{EnvironmentStatus, FleetRegistry};
pub use scaler::ScaleController;
