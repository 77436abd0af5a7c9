//! Tier gates and the tier → gate lookup table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use stackpause_core::{Notifier, TierKind};

use crate::coordination::Coordination;
use crate::error::GateResult;
use crate::gate::{Readiness, RetryPolicy, wait_until};

/// Blocks until a tier has `required_nodes` ready members.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    /// Returns the number of probes it took.
    async fn wait_ready(&self, required_nodes: u32) -> GateResult<u32>;
}

/// ZooKeeper ensemble: a leader with enough synced followers.
pub struct CoordinationGate {
    coordination: Arc<dyn Coordination>,
    policy: RetryPolicy,
    notifier: Arc<dyn Notifier>,
}

impl CoordinationGate {
    pub fn new(coordination: Arc<dyn Coordination>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            coordination,
            policy: RetryPolicy::coordination(),
            notifier,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl ReadinessCheck for CoordinationGate {
    async fn wait_ready(&self, required_nodes: u32) -> GateResult<u32> {
        self.notifier.info(&format!(
            "Waiting for {required_nodes} synced zookeeper ensemble nodes"
        ));
        let followers_needed = required_nodes.saturating_sub(1);

        wait_until(TierKind::Coordination.label(), &self.policy, || async {
            let state = self.coordination.server_state().await;
            if state.get("zk_state").map(String::as_str) == Some("unavailable") {
                return Ok(Readiness::Unavailable);
            }

            let role = state.get("zk_server_state").map(String::as_str);
            let synced: u32 = state
                .get("zk_synced_followers")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            debug!(?role, synced, followers_needed, "zookeeper state");

            Ok(if role == Some("leader") && synced >= followers_needed {
                Readiness::Ready
            } else {
                Readiness::NotReady
            })
        })
        .await
    }
}

/// Solr cloud: enough nodes registered under `/live_nodes`.
pub struct SearchGate {
    coordination: Arc<dyn Coordination>,
    policy: RetryPolicy,
    notifier: Arc<dyn Notifier>,
}

impl SearchGate {
    pub fn new(coordination: Arc<dyn Coordination>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            coordination,
            policy: RetryPolicy::search(),
            notifier,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl ReadinessCheck for SearchGate {
    async fn wait_ready(&self, required_nodes: u32) -> GateResult<u32> {
        self.notifier
            .info(&format!("Waiting for {required_nodes} live solr nodes"));

        wait_until(TierKind::Search.label(), &self.policy, || async {
            let live = self.coordination.live_nodes().await?;
            debug!(live = live.len(), required_nodes, "solr live nodes");
            Ok(if live.len() as u32 >= required_nodes {
                Readiness::Ready
            } else {
                Readiness::NotReady
            })
        })
        .await
    }
}

/// Which tiers are gated, and by what.
#[derive(Default, Clone)]
pub struct ReadinessGates {
    gates: HashMap<TierKind, Arc<dyn ReadinessCheck>>,
}

impl ReadinessGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordination and search gates backed by one ZooKeeper handle.
    pub fn standard(coordination: Arc<dyn Coordination>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new()
            .with_gate(
                TierKind::Coordination,
                Arc::new(CoordinationGate::new(coordination.clone(), notifier.clone())),
            )
            .with_gate(
                TierKind::Search,
                Arc::new(SearchGate::new(coordination, notifier)),
            )
    }

    pub fn with_gate(mut self, tier: TierKind, gate: Arc<dyn ReadinessCheck>) -> Self {
        self.gates.insert(tier, gate);
        self
    }

    pub fn get(&self, tier: TierKind) -> Option<&Arc<dyn ReadinessCheck>> {
        self.gates.get(&tier)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::coordination::unavailable_state;
    use crate::error::{GateError, ProbeError};
    use stackpause_core::BufferNotifier;

    /// Plays back scripted readings, repeating the last one.
    struct ScriptedZk {
        states: Mutex<Vec<BTreeMap<String, String>>>,
        live: Mutex<Vec<Result<usize, String>>>,
        probes: AtomicUsize,
    }

    impl ScriptedZk {
        fn new() -> Self {
            Self {
                states: Mutex::new(Vec::new()),
                live: Mutex::new(Vec::new()),
                probes: AtomicUsize::new(0),
            }
        }

        fn with_states(self, states: Vec<BTreeMap<String, String>>) -> Self {
            *self.states.lock().unwrap() = states;
            self
        }

        fn with_live(self, live: Vec<Result<usize, String>>) -> Self {
            *self.live.lock().unwrap() = live;
            self
        }
    }

    fn next<T: Clone>(items: &Mutex<Vec<T>>) -> T {
        let mut items = items.lock().unwrap();
        if items.len() > 1 {
            items.remove(0)
        } else {
            items[0].clone()
        }
    }

    #[async_trait]
    impl Coordination for ScriptedZk {
        async fn server_state(&self) -> BTreeMap<String, String> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            next(&self.states)
        }

        async fn live_nodes(&self) -> Result<Vec<String>, ProbeError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            match next(&self.live) {
                Ok(n) => Ok((0..n).map(|i| format!("10.0.0.{i}:8983_solr")).collect()),
                Err(e) => Err(ProbeError::Coordination(e)),
            }
        }
    }

    fn zk_state(role: &str, synced: u32) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("zk_server_state".to_string(), role.to_string()),
            ("zk_synced_followers".to_string(), synced.to_string()),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn coordination_gate_waits_for_synced_leader() {
        let zk = Arc::new(ScriptedZk::new().with_states(vec![
            unavailable_state(),
            zk_state("follower", 0),
            zk_state("leader", 1),
            zk_state("leader", 2),
        ]));
        let notifier = Arc::new(BufferNotifier::new());
        let gate = CoordinationGate::new(zk.clone(), notifier.clone());

        let probes = gate.wait_ready(3).await.unwrap();
        assert_eq!(probes, 4);
        assert!(notifier.contains("Waiting for 3 synced zookeeper ensemble nodes"));
    }

    #[tokio::test(start_paused = true)]
    async fn coordination_gate_times_out() {
        let zk = Arc::new(ScriptedZk::new().with_states(vec![zk_state("follower", 0)]));
        let gate = CoordinationGate::new(zk, Arc::new(BufferNotifier::new()));

        let err = gate.wait_ready(3).await.unwrap_err();
        assert!(matches!(err, GateError::Timeout { .. }));
        assert_eq!(err.to_string(), "Zookeeper failed to stabilize within 10 minutes");
    }

    #[tokio::test(start_paused = true)]
    async fn search_gate_retries_through_errors() {
        let zk = Arc::new(ScriptedZk::new().with_live(vec![
            Err("connection loss".to_string()),
            Ok(1),
            Ok(3),
        ]));
        let notifier = Arc::new(BufferNotifier::new());
        let gate = SearchGate::new(zk.clone(), notifier.clone())
            .with_policy(RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60)));

        let probes = gate.wait_ready(3).await.unwrap();
        assert_eq!(probes, 3);
        assert!(notifier.contains("Waiting for 3 live solr nodes"));
    }

    #[tokio::test(start_paused = true)]
    async fn search_gate_times_out_with_tier_name() {
        let zk = Arc::new(ScriptedZk::new().with_live(vec![Ok(1)]));
        let gate = SearchGate::new(zk.clone(), Arc::new(BufferNotifier::new()));

        let err = gate.wait_ready(2).await.unwrap_err();
        assert_eq!(err.to_string(), "Solr failed to stabilize within 10 minutes");
        // Polled every 30s over 10 minutes, plus the probe at the deadline.
        assert_eq!(zk.probes.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn standard_table_gates_coordination_and_search_only() {
        let zk: Arc<dyn Coordination> = Arc::new(ScriptedZk::new());
        let gates = ReadinessGates::standard(zk, Arc::new(BufferNotifier::new()));

        assert!(gates.get(TierKind::Coordination).is_some());
        assert!(gates.get(TierKind::Search).is_some());
        assert!(gates.get(TierKind::Repository).is_none());
        assert!(gates.get(TierKind::ImageServer).is_none());
        assert!(gates.get(TierKind::Web).is_none());
    }
}
