//! stackpause-health: readiness gates for dependent tiers.
//!
//! A gate blocks a resume phase until an external predicate holds or a
//! deadline elapses. Every gate shares one polling loop (`wait_until`)
//! driven by a `RetryPolicy`; the tiers differ only in their probe.
//!
//! # Gates
//!
//! ```text
//! Coordination (ZooKeeper)
//!   probe:  `mntr` over the client port (5s sub-timeout)
//!   ready:  zk_server_state == leader
//!           && zk_synced_followers >= required - 1
//!   policy: every 10s, give up after 10 minutes
//!
//! Search (Solr)
//!   probe:  children of /live_nodes in ZooKeeper
//!   ready:  count >= required
//!   policy: every 30s, give up after 10 minutes
//! ```
//!
//! Probe errors are retried (treated as not-ready) unless the policy's
//! `retryable` predicate says otherwise. A probe that cannot reach its
//! target within its sub-timeout reports `Unavailable` instead of
//! failing.

pub mod coordination;
pub mod error;
pub mod gate;
pub mod tiers;

pub use coordination::{Coordination, ZkCoordination, parse_mntr};
pub use error::{GateError, GateResult, ProbeError};
pub use gate::{Readiness, RetryPolicy, wait_until};
pub use tiers::{CoordinationGate, ReadinessCheck, ReadinessGates, SearchGate};
